//! Dashboard view: Main overview screen.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::application::{ImportanceSource, RecentSummary, RiskContext};
use crate::domain::{Condition, RiskBand};
use crate::tui::styles::MedicalTheme;

/// Training figures for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelStatus {
    pub condition: Condition,
    pub accuracy: Option<f64>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Dashboard state for rendering.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub models: Vec<ModelStatus>,
    pub importance_source: ImportanceSource,
    /// Loaded when history changes, not on every frame.
    pub recent: RecentSummary,
    pub history_error: Option<String>,
}

impl DashboardState {
    #[must_use]
    pub fn from_context(context: &RiskContext) -> Self {
        let models = Condition::ALL
            .iter()
            .map(|&condition| {
                let metrics = context.model(condition).metrics();
                ModelStatus {
                    condition,
                    accuracy: metrics.holdout_accuracy,
                    train_rows: metrics.train_rows,
                    test_rows: metrics.test_rows,
                }
            })
            .collect();
        Self {
            models,
            importance_source: context.importance_source(),
            recent: RecentSummary::default(),
            history_error: None,
        }
    }
}

/// Render the main dashboard view.
pub fn render_dashboard(f: &mut Frame, area: Rect, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Main content
        ])
        .split(area);

    render_header(f, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45), // Models and actions
            Constraint::Percentage(55), // Recent assessments
        ])
        .split(chunks[1]);

    render_status_panels(f, columns[0], state);
    render_recent_summary(f, columns[1], state);
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("AppHealth", MedicalTheme::title()),
        Span::styled(" │ ", MedicalTheme::text_muted()),
        Span::styled(
            "Diabetes & Hypertension Risk Scoring",
            MedicalTheme::text_secondary(),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_status_panels(f: &mut Frame, area: Rect, state: &DashboardState) {
    let gauge_rows = state.models.len() as u16 * 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(gauge_rows + 2), // Model accuracy
            Constraint::Min(0),                 // Quick actions
        ])
        .margin(1)
        .split(area);

    let models_block = Block::default()
        .title(Span::styled(" Models ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());
    let inner = models_block.inner(chunks[0]);
    f.render_widget(models_block, chunks[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(3); state.models.len()])
        .split(inner);

    for (row, model) in rows.iter().zip(&state.models) {
        let line = Line::from(vec![
            Span::styled(format!(" {} ", model.condition), MedicalTheme::text()),
            Span::styled(
                format!("train {} / test {}", model.train_rows, model.test_rows),
                MedicalTheme::text_muted(),
            ),
        ]);
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(*row);
        f.render_widget(Paragraph::new(line), parts[0]);

        let gauge = match model.accuracy {
            Some(acc) => Gauge::default()
                .gauge_style(MedicalTheme::accuracy(acc))
                .ratio(acc.clamp(0.0, 1.0))
                .label(format!("accuracy {:.1}%", acc * 100.0)),
            None => Gauge::default()
                .gauge_style(MedicalTheme::text_muted())
                .ratio(0.0)
                .label("no held-out rows"),
        };
        f.render_widget(gauge, parts[1]);
    }

    let source = match state.importance_source {
        ImportanceSource::Reference => "reference values",
        ImportanceSource::Model => "trained forest",
    };
    let actions = vec![
        Line::from(vec![
            Span::styled("[N] ", MedicalTheme::key_hint()),
            Span::styled("New Assessment", MedicalTheme::key_desc()),
        ]),
        Line::from(vec![
            Span::styled("[D] ", MedicalTheme::key_hint()),
            Span::styled("Delete Latest", MedicalTheme::key_desc()),
        ]),
        Line::from(vec![
            Span::styled("[X] ", MedicalTheme::key_hint()),
            Span::styled("Clear History", MedicalTheme::key_desc()),
        ]),
        Line::from(vec![
            Span::styled("[Q] ", MedicalTheme::key_hint()),
            Span::styled("Quit", MedicalTheme::key_desc()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Importances: ", MedicalTheme::text_secondary()),
            Span::styled(source, MedicalTheme::text_muted()),
        ]),
    ];

    let actions_block = Block::default()
        .title(Span::styled(" Quick Actions ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());

    f.render_widget(Paragraph::new(actions).block(actions_block), chunks[1]);
}

fn band_span(band: RiskBand) -> Span<'static> {
    Span::styled(band.to_string(), MedicalTheme::risk_band(band))
}

fn render_recent_summary(f: &mut Frame, area: Rect, state: &DashboardState) {
    let recent = &state.recent;
    let block = Block::default()
        .title(Span::styled(" Recent Assessments ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());

    if let Some(err) = &state.history_error {
        let msg = Paragraph::new(Line::from(vec![
            Span::styled("History unavailable: ", MedicalTheme::danger()),
            Span::styled(err.clone(), MedicalTheme::text_muted()),
        ]))
        .block(block);
        f.render_widget(msg, area);
        return;
    }

    if recent.total == 0 {
        let empty_msg = Paragraph::new(Line::from(vec![Span::styled(
            "No assessments yet. Press [N] to start.",
            MedicalTheme::text_muted(),
        )]))
        .block(block);
        f.render_widget(empty_msg, area);
        return;
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Stored: ", MedicalTheme::text_secondary()),
            Span::styled(recent.total.to_string(), MedicalTheme::text()),
            Span::styled(
                format!("   showing last {}", recent.recent.len()),
                MedicalTheme::text_muted(),
            ),
        ]),
        Line::from(vec![
            Span::styled("High diabetes risk: ", MedicalTheme::text_secondary()),
            Span::styled(recent.high_diabetes.to_string(), MedicalTheme::danger()),
            Span::styled("   High hypertension risk: ", MedicalTheme::text_secondary()),
            Span::styled(recent.high_hypertension.to_string(), MedicalTheme::danger()),
        ]),
        Line::from(""),
    ];

    lines.extend(recent.recent.iter().map(|a| {
        Line::from(vec![
            Span::styled(
                a.created_at.format("%Y-%m-%d %H:%M  ").to_string(),
                MedicalTheme::text_muted(),
            ),
            Span::styled("Diabetes ", MedicalTheme::text_secondary()),
            band_span(a.diabetes.band),
            Span::styled(format!(" {:>5.1}%   ", a.diabetes.probability * 100.0), MedicalTheme::text()),
            Span::styled("Hypertension ", MedicalTheme::text_secondary()),
            band_span(a.hypertension.band),
            Span::styled(format!(" {:>5.1}%", a.hypertension.probability * 100.0), MedicalTheme::text()),
        ])
    }));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
