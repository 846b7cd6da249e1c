//! Additional charts: pick comparisons from a checklist, then draw them.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::application::{Chart, ChartKind};
use crate::tui::styles::MedicalTheme;

use super::figures::{render_gauge, render_heatmap, render_histogram, render_importance};

#[derive(Debug, Clone, Default)]
pub struct ComparisonState {
    pub selected: [bool; ChartKind::ALL.len()],
    pub cursor: usize,
    pub charts: Vec<Chart>,
    pub error: Option<String>,
}

impl ComparisonState {
    pub fn next(&mut self) {
        self.cursor = (self.cursor + 1) % ChartKind::ALL.len();
    }

    pub fn prev(&mut self) {
        self.cursor = self.cursor.checked_sub(1).unwrap_or(ChartKind::ALL.len() - 1);
    }

    pub fn toggle(&mut self) {
        self.selected[self.cursor] = !self.selected[self.cursor];
    }

    pub fn select_all(&mut self) {
        let all = self.selected.iter().all(|s| *s);
        self.selected = [!all; ChartKind::ALL.len()];
    }

    /// Checked kinds in checklist order.
    #[must_use]
    pub fn selected_kinds(&self) -> Vec<ChartKind> {
        ChartKind::ALL
            .iter()
            .zip(self.selected)
            .filter_map(|(kind, on)| on.then_some(*kind))
            .collect()
    }
}

pub fn render_comparison(f: &mut Frame, area: Rect, state: &ComparisonState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Additional Charts", MedicalTheme::title()),
        Span::styled(" │ Patient vs. cohort", MedicalTheme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(0)])
        .split(chunks[1]);

    render_checklist(f, body[0], state);
    render_selected_charts(f, body[1], state);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled("[↑↓] ", MedicalTheme::key_hint()),
        Span::styled("Move ", MedicalTheme::key_desc()),
        Span::styled("[Space] ", MedicalTheme::key_hint()),
        Span::styled("Toggle ", MedicalTheme::key_desc()),
        Span::styled("[A] ", MedicalTheme::key_hint()),
        Span::styled("All ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Show ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("Results", MedicalTheme::key_desc()),
    ]))
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(footer, chunks[2]);
}

fn render_checklist(f: &mut Frame, area: Rect, state: &ComparisonState) {
    let lines: Vec<Line> = ChartKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let mark = if state.selected[i] { "[x] " } else { "[ ] " };
            let style = if i == state.cursor {
                MedicalTheme::selected()
            } else {
                MedicalTheme::text()
            };
            Line::from(vec![
                Span::styled(mark, MedicalTheme::key_hint()),
                Span::styled(kind.label(), style),
            ])
        })
        .collect();

    let list = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(" Charts ", MedicalTheme::subtitle()))
            .borders(Borders::ALL)
            .border_style(MedicalTheme::border_focused()),
    );
    f.render_widget(list, area);
}

fn render_selected_charts(f: &mut Frame, area: Rect, state: &ComparisonState) {
    if let Some(err) = &state.error {
        let p = Paragraph::new(Line::from(Span::styled(err.clone(), MedicalTheme::danger())))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(MedicalTheme::danger()),
            );
        f.render_widget(p, area);
        return;
    }

    if state.charts.is_empty() {
        let p = Paragraph::new(Line::from(Span::styled(
            "Select charts and press [Enter].",
            MedicalTheme::text_muted(),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border()),
        );
        f.render_widget(p, area);
        return;
    }

    // Two charts per row.
    let n_rows = state.charts.len().div_ceil(2);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, n_rows as u32); n_rows])
        .split(area);

    for (row, pair) in rows.iter().zip(state.charts.chunks(2)) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, pair.len() as u32); pair.len()])
            .split(*row);
        for (col, chart) in cols.iter().zip(pair) {
            match chart {
                Chart::Gauge(c) => render_gauge(f, *col, c),
                Chart::Histogram(c) => render_histogram(f, *col, c),
                Chart::Importance(c) => render_importance(f, *col, c),
                Chart::Heatmap(c) => render_heatmap(f, *col, c),
            }
        }
    }
}
