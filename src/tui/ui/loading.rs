//! Startup screen shown while cohorts load and models are prepared.

use std::time::Instant;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::application::StartupStep;
use crate::tui::styles::MedicalTheme;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub struct LoadingState {
    pub steps: Vec<StartupStep>,
    pub error: Option<String>,
    pub started_at: Instant,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            error: None,
            started_at: Instant::now(),
        }
    }
}

pub fn render_loading(f: &mut Frame, area: Rect, state: &LoadingState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Steps
            Constraint::Length(3), // Footer
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("AppHealth", MedicalTheme::title()),
        Span::styled(" │ Preparing risk models", MedicalTheme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(header, chunks[0]);

    let elapsed = state.started_at.elapsed();
    let frame = SPINNER[(elapsed.as_millis() / 150) as usize % SPINNER.len()];

    let mut lines: Vec<Line> = Vec::with_capacity(state.steps.len() + 3);
    let current = state.steps.len().saturating_sub(1);
    for (i, step) in state.steps.iter().enumerate() {
        let (mark, style) = if i < current {
            ("OK ", MedicalTheme::success())
        } else if state.error.is_some() {
            ("!! ", MedicalTheme::danger())
        } else {
            (frame, MedicalTheme::focused())
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {mark} "), style),
            Span::styled(step.to_string(), MedicalTheme::text()),
        ]));
    }

    if let Some(err) = &state.error {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Startup failed: ", MedicalTheme::danger()),
            Span::styled(err.clone(), MedicalTheme::text()),
        ]));
    } else {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Elapsed {:.1}s", elapsed.as_secs_f64()),
            MedicalTheme::text_muted(),
        )));
    }

    let body = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(Span::styled(" Startup ", MedicalTheme::subtitle()))
            .borders(Borders::ALL)
            .border_style(if state.error.is_some() {
                MedicalTheme::danger()
            } else {
                MedicalTheme::border()
            }),
    );
    f.render_widget(body, chunks[1]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled("[Q] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]))
    .alignment(Alignment::Left)
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(footer, chunks[2]);
}
