//! Results view: risk gauges, feature importances and correlation heatmaps.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::application::Assessment;
use crate::tui::styles::MedicalTheme;

use super::figures::{render_gauge, render_heatmap, render_importance};

/// Results state
#[derive(Debug, Clone, Default)]
pub enum ResultsState {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Scored submission
    Complete(Box<Assessment>),
    /// Submission rejected or failed
    Error { message: String },
}

/// Render the results view
pub fn render_results(f: &mut Frame, area: Rect, state: &ResultsState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    render_results_header(f, chunks[0]);
    match state {
        ResultsState::Idle => render_message(f, chunks[1], "Enter patient data to begin", false),
        ResultsState::Complete(assessment) => render_assessment(f, chunks[1], assessment),
        ResultsState::Error { message } => render_message(f, chunks[1], message, true),
    }
    render_results_footer(f, chunks[2], state);
}

fn render_results_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Risk Assessment", MedicalTheme::title()),
        Span::styled(" │ Random forest estimates", MedicalTheme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_assessment(f: &mut Frame, area: Rect, assessment: &Assessment) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Gauges
            Constraint::Length(9), // Importances
            Constraint::Min(6),    // Heatmaps
        ])
        .split(area);

    let halves = |area: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area)
    };

    let cols = halves(rows[0]);
    for (i, chart) in assessment.gauges.iter().enumerate() {
        render_gauge(f, cols[i], chart);
    }
    let cols = halves(rows[1]);
    for (i, chart) in assessment.importances.iter().enumerate() {
        render_importance(f, cols[i], chart);
    }
    let cols = halves(rows[2]);
    for (i, chart) in assessment.heatmaps.iter().enumerate() {
        render_heatmap(f, cols[i], chart);
    }
}

fn render_message(f: &mut Frame, area: Rect, message: &str, is_error: bool) {
    let (title, border) = if is_error {
        (Span::styled("! Error", MedicalTheme::danger()), MedicalTheme::danger())
    } else {
        (Span::styled("No assessment", MedicalTheme::text_secondary()), MedicalTheme::border())
    };

    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(title),
        Line::from(""),
        Line::from(Span::styled(message, MedicalTheme::text())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).border_style(border));

    f.render_widget(content, area);
}

fn render_results_footer(f: &mut Frame, area: Rect, state: &ResultsState) {
    let content = match state {
        ResultsState::Complete(_) => Line::from(vec![
            Span::styled("[C] ", MedicalTheme::key_hint()),
            Span::styled("More Charts ", MedicalTheme::key_desc()),
            Span::styled("[N] ", MedicalTheme::key_hint()),
            Span::styled("New Assessment ", MedicalTheme::key_desc()),
            Span::styled("[Esc] ", MedicalTheme::key_hint()),
            Span::styled("Dashboard", MedicalTheme::key_desc()),
        ]),
        _ => Line::from(vec![
            Span::styled("[Enter] ", MedicalTheme::key_hint()),
            Span::styled("Back to Form ", MedicalTheme::key_desc()),
            Span::styled("[Esc] ", MedicalTheme::key_hint()),
            Span::styled("Dashboard", MedicalTheme::key_desc()),
        ]),
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}
