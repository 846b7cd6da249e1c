//! Terminal renderings of chart descriptions.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Gauge, Paragraph, Row, Table},
    Frame,
};

use crate::application::charts::{GaugeChart, HeatmapChart, HistogramChart, ImportanceChart};
use crate::tui::styles::MedicalTheme;

/// Integer scale for fractional bar values.
const IMPORTANCE_SCALE: f64 = 10_000.0;

fn titled(title: &str) -> Block<'_> {
    Block::default()
        .title(Span::styled(format!(" {title} "), MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border())
}

/// Probability gauge with its band and threshold underneath.
pub fn render_gauge(f: &mut Frame, area: Rect, chart: &GaugeChart) {
    let block = titled(&chart.title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let ratio = if chart.axis_max > 0.0 {
        (chart.value / chart.axis_max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(MedicalTheme::color(chart.bar_color)))
        .ratio(ratio)
        .label(Span::styled(chart.label.clone(), MedicalTheme::title()));
    f.render_widget(gauge, rows[0]);

    let split = chart.steps.first().map_or(50.0, |s| s.to);
    let steps: Vec<Span> = chart
        .steps
        .iter()
        .map(|s| {
            Span::styled(
                format!("{:.0}-{:.0} ", s.from, s.to),
                Style::default().fg(MedicalTheme::color(s.color)),
            )
        })
        .collect();
    let mut legend = vec![
        Span::styled(format!("{} ", chart.band), MedicalTheme::risk_band(chart.band).add_modifier(Modifier::BOLD)),
        Span::styled(format!("threshold {split:.0}% "), MedicalTheme::text_muted()),
    ];
    legend.extend(steps);
    f.render_widget(Paragraph::new(Line::from(legend)), rows[1]);

    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            chart.band.description(),
            MedicalTheme::text_secondary(),
        ))),
        rows[2],
    );
}

/// Horizontal importance bars, most important on top.
pub fn render_importance(f: &mut Frame, area: Rect, chart: &ImportanceChart) {
    let bars: Vec<Bar> = chart
        .bars
        .iter()
        .map(|b| {
            Bar::default()
                .value((b.importance.max(0.0) * IMPORTANCE_SCALE).round() as u64)
                .label(Line::from(b.feature.clone()))
                .text_value(format!("{:.4}", b.importance))
                .style(Style::default().fg(MedicalTheme::PRIMARY))
        })
        .collect();

    let widget = BarChart::default()
        .block(titled(&chart.title))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(1)
        .value_style(MedicalTheme::text())
        .label_style(MedicalTheme::text_secondary())
        .data(BarGroup::default().bars(&bars));
    f.render_widget(widget, area);
}

/// Diverging background for a correlation value.
fn correlation_color(r: f64) -> Color {
    if r.is_nan() {
        return MedicalTheme::BG_CARD;
    }
    let t = r.abs().min(1.0);
    let fade = |full: u8| (255.0 - (255.0 - f64::from(full)) * t).round() as u8;
    if r >= 0.0 {
        Color::Rgb(255, fade(64), fade(64))
    } else {
        Color::Rgb(fade(64), fade(96), 255)
    }
}

/// Annotated correlation matrix as a colored table.
pub fn render_heatmap(f: &mut Frame, area: Rect, chart: &HeatmapChart) {
    let header = Row::new(
        std::iter::once(Cell::from(""))
            .chain(chart.labels.iter().map(|l| Cell::from(l.clone())))
            .collect::<Vec<_>>(),
    )
    .style(MedicalTheme::subtitle());

    let rows: Vec<Row> = chart
        .labels
        .iter()
        .zip(&chart.cells)
        .map(|(label, cells)| {
            let mut row = vec![Cell::from(label.clone()).style(MedicalTheme::subtitle())];
            row.extend(cells.iter().map(|cell| {
                Cell::from(cell.text.clone()).style(
                    Style::default()
                        .fg(MedicalTheme::color(cell.text_color))
                        .bg(correlation_color(cell.value)),
                )
            }));
            Row::new(row)
        })
        .collect();

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(10))
        .chain(chart.labels.iter().map(|_| Constraint::Length(9)))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(titled(&chart.title));
    f.render_widget(table, area);
}

/// Short numeric label for an axis position.
fn axis_label(value: f64) -> String {
    if value.abs() >= 100.0 || value.fract() == 0.0 {
        format!("{value:.0}")
    } else if value.abs() >= 10.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

/// Histogram with the bin holding the patient's value highlighted.
pub fn render_histogram(f: &mut Frame, area: Rect, chart: &HistogramChart) {
    let block = titled(&chart.title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);

    let edges = &chart.histogram.edges;
    let last = chart.histogram.counts.len().saturating_sub(1);
    let patient_bin = (0..chart.histogram.counts.len()).position(|i| {
        let (lo, hi) = (edges[i], edges[i + 1]);
        chart.marker.x >= lo && (chart.marker.x < hi || (i == last && chart.marker.x <= hi))
    });

    let bars: Vec<Bar> = chart
        .histogram
        .counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let label = chart
                .ticks
                .iter()
                .find(|t| (t.value - chart.bar_x[i]).abs() < chart.bar_width / 2.0)
                .map_or_else(|| axis_label(chart.bar_x[i]), |t| t.label.clone());
            let color = if patient_bin == Some(i) {
                chart.marker.color
            } else {
                chart.bar_color
            };
            Bar::default()
                .value(count)
                .label(Line::from(label))
                .style(Style::default().fg(MedicalTheme::color(color)))
        })
        .collect();

    let n = bars.len().max(1) as u16;
    let bar_width = (rows[0].width.saturating_sub(n) / n).max(1);

    let widget = BarChart::default()
        .bar_width(bar_width)
        .bar_gap(1)
        .max(chart.marker.height.ceil().max(1.0) as u64)
        .value_style(MedicalTheme::text_muted())
        .label_style(MedicalTheme::text_secondary())
        .data(BarGroup::default().bars(&bars));
    f.render_widget(widget, rows[0]);

    let caption = Line::from(vec![
        Span::styled("│ ", Style::default().fg(MedicalTheme::color(chart.marker.color))),
        Span::styled("Patient: ", MedicalTheme::text_secondary()),
        Span::styled(axis_label(chart.marker.x), MedicalTheme::text()),
        Span::styled(
            format!("   x: {}  y: {}", chart.x_title, chart.y_title),
            MedicalTheme::text_muted(),
        ),
    ]);
    f.render_widget(Paragraph::new(caption), rows[1]);
}
