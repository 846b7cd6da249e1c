//! Probability and population data to chart descriptions.
//!
//! Every function here is a pure transform: same inputs, same chart. The
//! descriptions are plain serializable data; the TUI (or any other front end)
//! decides how to draw them.

use serde::Serialize;

use crate::domain::{RiskBand, AGE_BAND_LABELS, DEFAULT_RISK_THRESHOLD};

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const LIGHT_GREEN: Rgb = Rgb(144, 238, 144);
    pub const LIGHT_CORAL: Rgb = Rgb(240, 128, 128);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const ORANGE: Rgb = Rgb(255, 183, 77); // #FFB74D
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Shared chart parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub bin_count: usize,
    pub risk_threshold: f64,
    pub low_color: Rgb,
    pub high_color: Rgb,
    pub low_zone_color: Rgb,
    pub high_zone_color: Rgb,
    pub threshold_color: Rgb,
    pub population_color: Rgb,
    pub patient_color: Rgb,
    pub annotation_dark: Rgb,
    pub annotation_light: Rgb,
    /// `|r|` at or above which heatmap annotations switch to light text.
    pub annotation_contrast_at: f64,
    pub feature_headroom: f64,
    pub risk_headroom: f64,
    pub frequency_title: String,
    pub risk_axis_title: String,
    pub age_axis_title: String,
    pub importance_axis_title: String,
    pub features_axis_title: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            bin_count: 13,
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            low_color: Rgb::GREEN,
            high_color: Rgb::RED,
            low_zone_color: Rgb::LIGHT_GREEN,
            high_zone_color: Rgb::LIGHT_CORAL,
            threshold_color: Rgb::BLUE,
            population_color: Rgb::ORANGE,
            patient_color: Rgb::RED,
            annotation_dark: Rgb::BLACK,
            annotation_light: Rgb::WHITE,
            annotation_contrast_at: 0.7,
            feature_headroom: 1.1,
            risk_headroom: 1.0,
            frequency_title: "Frequency".into(),
            risk_axis_title: "Risk probability".into(),
            age_axis_title: "Age (band)".into(),
            importance_axis_title: "Importance".into(),
            features_axis_title: "Features".into(),
        }
    }
}

/// Colored band on the gauge axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeStep {
    pub from: f64,
    pub to: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeChart {
    pub title: String,
    /// Probability scaled to the 0-100 axis.
    pub value: f64,
    /// Value with one decimal and a percent sign.
    pub label: String,
    pub axis_max: f64,
    pub band: RiskBand,
    pub bar_color: Rgb,
    pub steps: Vec<GaugeStep>,
    pub threshold: f64,
    pub threshold_color: Rgb,
}

/// Equal-width bin counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `counts.len() + 1` ascending edges.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Vertical line at the patient's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMarker {
    pub x: f64,
    pub height: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTick {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramChart {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub histogram: Histogram,
    /// Bar anchor per bin (lower edge, or bin center when centered).
    pub bar_x: Vec<f64>,
    pub bar_width: f64,
    pub bar_color: Rgb,
    pub marker: PatientMarker,
    /// Custom tick labels; empty means numeric ticks.
    pub ticks: Vec<AxisTick>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceBar {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceChart {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    /// Sorted by importance, descending.
    pub bars: Vec<ImportanceBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    /// Pearson r; NaN when undefined.
    pub value: f64,
    pub text: String,
    pub text_color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapChart {
    pub title: String,
    pub labels: Vec<String>,
    /// Row-major, `labels.len()` square.
    pub cells: Vec<Vec<HeatmapCell>>,
}

/// Any chart the dashboard can show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chart {
    Gauge(GaugeChart),
    Histogram(HistogramChart),
    Importance(ImportanceChart),
    Heatmap(HeatmapChart),
}

/// Optional comparison charts offered after an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    DiabetesRisk,
    HypertensionRisk,
    BmiDistribution,
    AgeDistribution,
    HeartRateDistribution,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::DiabetesRisk,
        ChartKind::HypertensionRisk,
        ChartKind::BmiDistribution,
        ChartKind::AgeDistribution,
        ChartKind::HeartRateDistribution,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DiabetesRisk => "Diabetes risk distribution",
            Self::HypertensionRisk => "Hypertension risk distribution",
            Self::BmiDistribution => "BMI distribution",
            Self::AgeDistribution => "Age distribution",
            Self::HeartRateDistribution => "Maximum heart rate distribution",
        }
    }
}

/// Gauge for one probability. The bar turns "high" only strictly above the threshold.
#[must_use]
pub fn gauge(config: &ChartConfig, probability: f64, title: &str) -> GaugeChart {
    let value = probability * 100.0;
    let band = RiskBand::from_probability(probability, config.risk_threshold);
    let split = config.risk_threshold * 100.0;

    GaugeChart {
        title: title.to_string(),
        value,
        label: format!("{value:.1}%"),
        axis_max: 100.0,
        band,
        bar_color: match band {
            RiskBand::Low => config.low_color,
            RiskBand::High => config.high_color,
        },
        steps: vec![
            GaugeStep {
                from: 0.0,
                to: split,
                color: config.low_zone_color,
            },
            GaugeStep {
                from: split,
                to: 100.0,
                color: config.high_zone_color,
            },
        ],
        threshold: value,
        threshold_color: config.threshold_color,
    }
}

/// Count finite `values` into `bins` equal-width bins over `[min, max]`.
///
/// Degenerate ranges widen to `[v - 0.5, v + 0.5]`; no finite data uses
/// `[0, 1]`. The last bin includes its right edge.
#[must_use]
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    let (lo, hi) = match finite.iter().copied().fold(None, |acc: Option<(f64, f64)>, v| {
        Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
    }) {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => (lo - 0.5, hi + 0.5),
        Some(range) => range,
    };

    let span = hi - lo;
    let mut edges: Vec<f64> = (0..=bins)
        .map(|i| lo + span * i as f64 / bins as f64)
        .collect();
    edges[bins] = hi;

    let mut counts = vec![0u64; bins];
    for v in finite {
        let index = (((v - lo) / span) * bins as f64).floor() as usize;
        counts[index.min(bins - 1)] += 1;
    }

    Histogram { edges, counts }
}

fn histogram_chart(
    config: &ChartConfig,
    values: &[f64],
    patient_value: f64,
    headroom: f64,
    centered: bool,
    title: &str,
    x_title: &str,
) -> HistogramChart {
    let histogram = histogram(values, config.bin_count);
    let width = histogram.bin_width();
    let offset = if centered { width / 2.0 } else { 0.0 };
    let bar_x = histogram.edges[..histogram.counts.len()]
        .iter()
        .map(|edge| edge + offset)
        .collect();
    let height = histogram.max_count() as f64 * headroom;

    HistogramChart {
        title: title.to_string(),
        x_title: x_title.to_string(),
        y_title: config.frequency_title.clone(),
        bar_x,
        bar_width: width,
        bar_color: config.population_color,
        marker: PatientMarker {
            x: patient_value,
            height,
            color: config.patient_color,
        },
        ticks: Vec::new(),
        histogram,
    }
}

/// Population distribution of one feature with the patient's value marked.
#[must_use]
pub fn feature_distribution(
    config: &ChartConfig,
    values: &[f64],
    patient_value: f64,
    feature: &str,
    title: &str,
) -> HistogramChart {
    histogram_chart(
        config,
        values,
        patient_value,
        config.feature_headroom,
        false,
        title,
        feature,
    )
}

/// Distribution of cohort-wide predicted probabilities with the patient's.
#[must_use]
pub fn risk_distribution(
    config: &ChartConfig,
    probabilities: &[f64],
    patient_probability: f64,
    title: &str,
) -> HistogramChart {
    histogram_chart(
        config,
        probabilities,
        patient_probability,
        config.risk_headroom,
        false,
        title,
        &config.risk_axis_title,
    )
}

/// Distribution of age band codes with centered bars and band tick labels.
#[must_use]
pub fn age_distribution(
    config: &ChartConfig,
    band_codes: &[f64],
    patient_code: u8,
    title: &str,
) -> HistogramChart {
    let mut chart = histogram_chart(
        config,
        band_codes,
        f64::from(patient_code),
        config.risk_headroom,
        true,
        title,
        &config.age_axis_title,
    );
    chart.ticks = AGE_BAND_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| AxisTick {
            value: (i + 1) as f64,
            label: (*label).to_string(),
        })
        .collect();
    chart
}

/// Horizontal importance bars, most important first.
#[must_use]
pub fn importance_chart(config: &ChartConfig, importances: &[(String, f64)], title: &str) -> ImportanceChart {
    let mut bars: Vec<ImportanceBar> = importances
        .iter()
        .map(|(feature, importance)| ImportanceBar {
            feature: feature.clone(),
            importance: *importance,
        })
        .collect();
    bars.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| b.feature.cmp(&a.feature))
    });

    ImportanceChart {
        title: title.to_string(),
        x_title: config.importance_axis_title.clone(),
        y_title: config.features_axis_title.clone(),
        bars,
    }
}

/// Pearson correlation; NaN when either side has zero variance or fewer
/// than two paired values exist.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Annotated Pearson correlation matrix over the given columns.
#[must_use]
pub fn correlation_heatmap(config: &ChartConfig, columns: &[(&str, &[f64])], title: &str) -> HeatmapChart {
    let cells = columns
        .iter()
        .map(|(_, x)| {
            columns
                .iter()
                .map(|(_, y)| {
                    let value = pearson(x, y);
                    let text = if value.is_nan() {
                        "nan".to_string()
                    } else {
                        format!("{:.2}", (value * 100.0).round() / 100.0 + 0.0)
                    };
                    let text_color = if value.abs() < config.annotation_contrast_at {
                        config.annotation_dark
                    } else {
                        config.annotation_light
                    };
                    HeatmapCell {
                        value,
                        text,
                        text_color,
                    }
                })
                .collect()
        })
        .collect();

    HeatmapChart {
        title: title.to_string(),
        labels: columns.iter().map(|(name, _)| (*name).to_string()).collect(),
        cells,
    }
}
