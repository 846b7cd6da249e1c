//! Risk pipeline context.
//!
//! [`RiskContext`] owns everything a submission needs: one trained model and
//! one cohort per condition, plus chart settings. It is built once at startup
//! and never mutated afterwards, so request handlers share it behind an `Arc`.

use crate::adapters::forest::RandomForest;
use crate::adapters::JsonModelStore;
use crate::application::charts::{
    self, Chart, ChartConfig, ChartKind, GaugeChart, HeatmapChart, ImportanceChart,
};
use crate::application::model::ForestModel;
use crate::config::Config;
use crate::domain::{
    age_bucket, CohortDataset, Condition, ConditionRisk, InputError, PatientInput, PatientSample,
    RiskAssessment,
};
use crate::ports::{CohortSource, ModelError};
use crate::AppHealthError;

/// Where displayed feature importances come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportanceSource {
    /// Fixed reference values per condition.
    #[default]
    Reference,
    /// Impurity importances of the trained forest.
    Model,
}

/// Startup progress reported by [`RiskContext::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStep {
    LoadingCohort(Condition),
    LoadingArtifact(Condition),
    Training(Condition),
    ScoringPopulation,
}

impl std::fmt::Display for StartupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadingCohort(c) => write!(f, "Loading {c} cohort..."),
            Self::LoadingArtifact(c) => write!(f, "Checking saved {c} model..."),
            Self::Training(c) => write!(f, "Training {c} model..."),
            Self::ScoringPopulation => write!(f, "Scoring cohort population..."),
        }
    }
}

/// Why a submission produced no result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Error processing the data: {0}")]
    Processing(#[from] ModelError),
}

/// Result of one submission: the stored record plus the results-view charts.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub record: RiskAssessment,
    /// Diabetes first, then hypertension.
    pub gauges: [GaugeChart; 2],
    pub importances: [ImportanceChart; 2],
    pub heatmaps: [HeatmapChart; 2],
}

/// Everything kept per condition.
#[derive(Debug, Clone)]
struct ConditionState {
    model: ForestModel,
    cohort: CohortDataset,
    /// Predicted probability for every cohort row.
    population: Vec<f64>,
    heatmap: HeatmapChart,
}

impl ConditionState {
    fn new(model: ForestModel, cohort: CohortDataset, config: &ChartConfig) -> Result<Self, ModelError> {
        let condition = model.condition();
        let population = model.predict_cohort(&cohort)?;

        let columns = model.encoded_columns(&cohort)?;
        let named: Vec<(&str, &[f64])> = model
            .feature_names()
            .iter()
            .map(String::as_str)
            .zip(columns.iter().map(Vec::as_slice))
            .collect();
        let heatmap = charts::correlation_heatmap(
            config,
            &named,
            &format!("Feature correlation ({condition})"),
        );

        Ok(Self {
            model,
            cohort,
            population,
            heatmap,
        })
    }
}

/// Immutable state shared by every submission.
#[derive(Debug, Clone)]
pub struct RiskContext {
    diabetes: ConditionState,
    hypertension: ConditionState,
    chart_config: ChartConfig,
    importance_source: ImportanceSource,
}

impl RiskContext {
    /// Assemble a context from trained models and their cohorts.
    ///
    /// Scores the whole population of each cohort once, up front.
    ///
    /// # Errors
    /// `InvalidParameter` when a model is passed for the wrong condition;
    /// any failure scoring a cohort.
    pub fn new(
        diabetes: (ForestModel, CohortDataset),
        hypertension: (ForestModel, CohortDataset),
        chart_config: ChartConfig,
        importance_source: ImportanceSource,
    ) -> Result<Self, ModelError> {
        for (expected, model) in [
            (Condition::Diabetes, &diabetes.0),
            (Condition::Hypertension, &hypertension.0),
        ] {
            if model.condition() != expected {
                return Err(ModelError::InvalidParameter(format!(
                    "{} model supplied where {expected} was expected",
                    model.condition()
                )));
            }
        }

        Ok(Self {
            diabetes: ConditionState::new(diabetes.0, diabetes.1, &chart_config)?,
            hypertension: ConditionState::new(hypertension.0, hypertension.1, &chart_config)?,
            chart_config,
            importance_source,
        })
    }

    /// Load cohorts, load or train models, and build the context.
    ///
    /// A verified artifact in the model directory is used when it was trained
    /// with the configured forest and split settings on the same cohort. A
    /// missing or stale one means the model is trained from its cohort and
    /// saved for the next start; failing to save only logs a warning. An
    /// artifact failing verification is an error.
    ///
    /// # Errors
    /// Cohort loading, artifact verification, training or scoring failures.
    pub fn bootstrap<S: CohortSource>(
        source: &S,
        store: &JsonModelStore,
        config: &Config,
        mut on_step: impl FnMut(StartupStep),
    ) -> Result<Self, AppHealthError> {
        let mut load = |condition: Condition| -> Result<(ForestModel, CohortDataset), AppHealthError> {
            on_step(StartupStep::LoadingCohort(condition));
            let cohort = source.load(condition)?;

            on_step(StartupStep::LoadingArtifact(condition));
            let saved = store.load::<ForestModel>(condition)?;
            if let Some(model) = &saved {
                if model.condition() != condition {
                    return Err(AppHealthError::ConditionMismatch {
                        expected: condition,
                        found: model.condition(),
                    });
                }
            }
            let model = match saved {
                Some(model) if model.is_current(&config.forest, &config.training, &cohort) => model,
                stale => {
                    if stale.is_some() {
                        tracing::info!(%condition, "Saved model does not match current settings or cohort, retraining");
                    } else {
                        tracing::info!(%condition, "No saved model, training from cohort");
                    }
                    on_step(StartupStep::Training(condition));
                    let model = ForestModel::train(
                        &cohort,
                        condition,
                        RandomForest::new(config.forest),
                        &config.training,
                    )?;
                    if let Err(e) = store.save(condition, &model) {
                        tracing::warn!(%condition, error = %e, "Could not save trained model");
                    }
                    model
                }
            };
            Ok((model, cohort))
        };

        let diabetes = load(Condition::Diabetes)?;
        let hypertension = load(Condition::Hypertension)?;

        on_step(StartupStep::ScoringPopulation);
        let context = Self::new(
            diabetes,
            hypertension,
            config.chart.clone(),
            config.importance_source,
        )?;
        tracing::info!("Risk context ready");
        Ok(context)
    }

    fn state(&self, condition: Condition) -> &ConditionState {
        match condition {
            Condition::Diabetes => &self.diabetes,
            Condition::Hypertension => &self.hypertension,
        }
    }

    #[must_use]
    pub fn model(&self, condition: Condition) -> &ForestModel {
        &self.state(condition).model
    }

    #[must_use]
    pub fn cohort(&self, condition: Condition) -> &CohortDataset {
        &self.state(condition).cohort
    }

    #[must_use]
    pub fn chart_config(&self) -> &ChartConfig {
        &self.chart_config
    }

    #[must_use]
    pub fn importance_source(&self) -> ImportanceSource {
        self.importance_source
    }

    fn probability(&self, input: &PatientInput, condition: Condition) -> Result<f64, AssessmentError> {
        let sample = PatientSample::prepare(input, condition)?;
        let probability = self.model(condition).predict_probability(&sample)?;
        Ok(probability)
    }

    /// Importances shown for `condition`, per the configured source.
    #[must_use]
    pub fn importances(&self, condition: Condition) -> Vec<(String, f64)> {
        match self.importance_source {
            ImportanceSource::Reference => condition
                .feature_names()
                .iter()
                .zip(condition.reference_importances())
                .map(|(name, value)| ((*name).to_string(), value))
                .collect(),
            ImportanceSource::Model => self.model(condition).feature_importances(),
        }
    }

    /// Score one submission against both models.
    ///
    /// # Errors
    /// `Input` when the form is incomplete or out of range, `Processing` when
    /// feature preparation or a model call fails.
    pub fn assess(&self, input: &PatientInput) -> Result<Assessment, AssessmentError> {
        input.validate()?;

        let threshold = self.chart_config.risk_threshold;
        let diabetes = self.probability(input, Condition::Diabetes)?;
        let hypertension = self.probability(input, Condition::Hypertension)?;

        let record = RiskAssessment::new(
            ConditionRisk::new(Condition::Diabetes, diabetes, threshold),
            ConditionRisk::new(Condition::Hypertension, hypertension, threshold),
        );
        tracing::info!(assessment_id = %record.id, "Assessment scored");

        let cfg = &self.chart_config;
        let [d, h] = Condition::ALL;
        Ok(Assessment {
            gauges: [
                charts::gauge(cfg, diabetes, "Diabetes risk"),
                charts::gauge(cfg, hypertension, "Hypertension risk"),
            ],
            importances: [
                charts::importance_chart(cfg, &self.importances(d), "Feature importance (Diabetes)"),
                charts::importance_chart(cfg, &self.importances(h), "Feature importance (Hypertension)"),
            ],
            heatmaps: [self.diabetes.heatmap.clone(), self.hypertension.heatmap.clone()],
            record,
        })
    }

    /// Build the selected additional charts for a submission, in the order
    /// given.
    ///
    /// Samples are derived again from `input`; nothing from an earlier
    /// [`RiskContext::assess`] call is reused.
    ///
    /// # Errors
    /// Same as [`RiskContext::assess`].
    pub fn additional_charts(
        &self,
        input: &PatientInput,
        kinds: &[ChartKind],
    ) -> Result<Vec<Chart>, AssessmentError> {
        let (age, bmi) = input.validate()?;
        let cfg = &self.chart_config;

        kinds
            .iter()
            .map(|kind| -> Result<Chart, AssessmentError> {
                let chart = match kind {
                    ChartKind::DiabetesRisk => charts::risk_distribution(
                        cfg,
                        &self.diabetes.population,
                        self.probability(input, Condition::Diabetes)?,
                        "Diabetes risk distribution",
                    ),
                    ChartKind::HypertensionRisk => charts::risk_distribution(
                        cfg,
                        &self.hypertension.population,
                        self.probability(input, Condition::Hypertension)?,
                        "Hypertension risk distribution",
                    ),
                    ChartKind::BmiDistribution => charts::feature_distribution(
                        cfg,
                        self.diabetes.cohort.numeric("BMI").map_err(ModelError::from)?,
                        bmi,
                        "BMI",
                        "BMI distribution",
                    ),
                    ChartKind::AgeDistribution => {
                        let band = age_bucket(age).ok_or(InputError::NoAgeBand(age))?;
                        charts::age_distribution(
                            cfg,
                            self.diabetes.cohort.numeric("Age").map_err(ModelError::from)?,
                            band,
                            "Age distribution",
                        )
                    }
                    ChartKind::HeartRateDistribution => {
                        let sample = PatientSample::prepare(input, Condition::Hypertension)?;
                        let thalach = sample
                            .value("thalach")
                            .ok_or_else(|| ModelError::InvalidParameter("thalach missing".into()))?;
                        charts::feature_distribution(
                            cfg,
                            self.hypertension.cohort.numeric("thalach").map_err(ModelError::from)?,
                            thalach,
                            "Maximum heart rate",
                            "Maximum heart rate distribution",
                        )
                    }
                };
                Ok(Chart::Histogram(chart))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fixtures::{diabetes_cohort, hypertension_cohort, scenario_input, small_forest};
    use crate::adapters::forest::ForestParams;
    use crate::application::model::TrainingOptions;

    fn context(source: ImportanceSource) -> RiskContext {
        let options = TrainingOptions::default();
        let d_cohort = diabetes_cohort(300, 1);
        let h_cohort = hypertension_cohort(300, 2);
        let d_model = ForestModel::train(
            &d_cohort,
            Condition::Diabetes,
            RandomForest::new(small_forest()),
            &options,
        )
        .expect("Should train diabetes");
        let h_model = ForestModel::train(
            &h_cohort,
            Condition::Hypertension,
            RandomForest::new(small_forest()),
            &options,
        )
        .expect("Should train hypertension");

        RiskContext::new(
            (d_model, d_cohort),
            (h_model, h_cohort),
            ChartConfig::default(),
            source,
        )
        .expect("Should build context")
    }

    #[test]
    fn test_scenario_produces_bounded_probabilities() {
        let ctx = context(ImportanceSource::Reference);
        let assessment = ctx.assess(&scenario_input()).expect("Should assess");

        for risk in [&assessment.record.diabetes, &assessment.record.hypertension] {
            assert!(risk.probability.is_finite());
            assert!((0.0..=1.0).contains(&risk.probability));
        }
        assert!((assessment.gauges[0].value - assessment.record.diabetes.probability * 100.0).abs() < 1e-9);
        assert_eq!(assessment.heatmaps[0].labels.len(), 3);
    }

    #[test]
    fn test_missing_age_reports_incomplete_form() {
        let ctx = context(ImportanceSource::Reference);
        let input = PatientInput {
            age: None,
            ..scenario_input()
        };

        let err = ctx.assess(&input).expect_err("Should reject");
        assert_eq!(err.to_string(), "Please complete all fields before continuing.");

        let charts = ctx.additional_charts(&input, &ChartKind::ALL);
        assert!(charts.is_err());
    }

    #[test]
    fn test_reference_importances_sorted() {
        let ctx = context(ImportanceSource::Reference);
        let assessment = ctx.assess(&scenario_input()).expect("Should assess");

        let bars = &assessment.importances[0].bars;
        let names: Vec<&str> = bars.iter().map(|b| b.feature.as_str()).collect();
        assert_eq!(names, vec!["BMI", "Age", "GenHlth"]);
        let expected = Condition::Diabetes.reference_importances()[0];
        assert!((bars[0].importance - expected).abs() < 1e-12);
    }

    #[test]
    fn test_model_importances_sum_to_one() {
        let ctx = context(ImportanceSource::Model);
        let total: f64 = ctx.importances(Condition::Hypertension).iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_additional_charts_follow_selection() {
        let ctx = context(ImportanceSource::Reference);
        let kinds = [ChartKind::HeartRateDistribution, ChartKind::AgeDistribution];
        let charts = ctx
            .additional_charts(&scenario_input(), &kinds)
            .expect("Should build charts");
        assert_eq!(charts.len(), 2);

        match &charts[0] {
            Chart::Histogram(h) => {
                assert!((h.marker.x - 155.0).abs() < 1e-12);
            }
            other => panic!("Expected histogram, got {other:?}"),
        }
        match &charts[1] {
            Chart::Histogram(h) => {
                assert_eq!(h.ticks.len(), 13);
                assert!((h.marker.x - 6.0).abs() < 1e-12);
            }
            other => panic!("Expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_chart_mapping_is_idempotent() {
        let ctx = context(ImportanceSource::Reference);
        let first = ctx
            .additional_charts(&scenario_input(), &ChartKind::ALL)
            .expect("Should build charts");
        let second = ctx
            .additional_charts(&scenario_input(), &ChartKind::ALL)
            .expect("Should build charts");
        assert_eq!(first, second);
        assert_eq!(first.len(), ChartKind::ALL.len());
    }

    struct FixtureSource {
        seed: u64,
    }

    impl CohortSource for FixtureSource {
        fn load(&self, condition: Condition) -> Result<CohortDataset, crate::domain::CohortError> {
            Ok(match condition {
                Condition::Diabetes => diabetes_cohort(150, self.seed),
                Condition::Hypertension => hypertension_cohort(150, self.seed + 1),
            })
        }
    }

    fn temp_store(tag: &str) -> (std::path::PathBuf, JsonModelStore) {
        let dir = std::env::temp_dir().join(format!("apphealth-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = JsonModelStore::new(&dir);
        (dir, store)
    }

    fn trained_conditions(steps: &[StartupStep]) -> Vec<Condition> {
        steps
            .iter()
            .filter_map(|s| match s {
                StartupStep::Training(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_bootstrap_trains_then_reuses_artifacts() {
        let (dir, store) = temp_store("bootstrap");
        let source = FixtureSource { seed: 4 };
        let config = Config {
            forest: small_forest(),
            ..Config::default()
        };

        let mut steps = Vec::new();
        let first = RiskContext::bootstrap(&source, &store, &config, |s| steps.push(s))
            .expect("Should bootstrap");
        assert!(steps.contains(&StartupStep::Training(Condition::Diabetes)));
        assert_eq!(steps.last(), Some(&StartupStep::ScoringPopulation));
        assert!(store.exists(Condition::Hypertension));

        let mut steps = Vec::new();
        let second = RiskContext::bootstrap(&source, &store, &config, |s| steps.push(s))
            .expect("Should bootstrap from artifacts");
        assert!(!steps.iter().any(|s| matches!(s, StartupStep::Training(_))));

        let a = first.assess(&scenario_input()).expect("Should assess");
        let b = second.assess(&scenario_input()).expect("Should assess");
        assert!((a.record.diabetes.probability - b.record.diabetes.probability).abs() < 1e-12);
        assert!((a.record.hypertension.probability - b.record.hypertension.probability).abs() < 1e-12);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_changed_forest_params_force_retrain() {
        let (dir, store) = temp_store("params");
        let source = FixtureSource { seed: 4 };
        let config = Config {
            forest: small_forest(),
            ..Config::default()
        };
        RiskContext::bootstrap(&source, &store, &config, |_| {}).expect("Should bootstrap");

        let changed = Config {
            forest: ForestParams {
                n_trees: 3,
                seed: 7,
                ..small_forest()
            },
            ..Config::default()
        };
        let mut steps = Vec::new();
        let ctx = RiskContext::bootstrap(&source, &store, &changed, |s| steps.push(s))
            .expect("Should bootstrap with new params");
        assert_eq!(trained_conditions(&steps), Condition::ALL.to_vec());
        assert_eq!(ctx.model(Condition::Diabetes).classifier().params().n_trees, 3);

        let saved = store
            .load::<ForestModel>(Condition::Diabetes)
            .expect("Should verify")
            .expect("Should exist");
        assert!(saved.is_current(&changed.forest, &changed.training, ctx.cohort(Condition::Diabetes)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_changed_cohort_or_split_forces_retrain() {
        let (dir, store) = temp_store("cohort");
        let config = Config {
            forest: small_forest(),
            ..Config::default()
        };
        RiskContext::bootstrap(&FixtureSource { seed: 4 }, &store, &config, |_| {}).expect("Should bootstrap");

        let mut steps = Vec::new();
        RiskContext::bootstrap(&FixtureSource { seed: 40 }, &store, &config, |s| steps.push(s))
            .expect("Should bootstrap with new cohort");
        assert_eq!(trained_conditions(&steps), Condition::ALL.to_vec());

        let resplit = Config {
            training: TrainingOptions {
                split_seed: config.training.split_seed + 1,
                ..config.training
            },
            ..config.clone()
        };
        let mut steps = Vec::new();
        let ctx = RiskContext::bootstrap(&FixtureSource { seed: 40 }, &store, &resplit, |s| steps.push(s))
            .expect("Should bootstrap with new split");
        assert_eq!(trained_conditions(&steps), Condition::ALL.to_vec());
        assert_eq!(ctx.model(Condition::Hypertension).training_options(), &resplit.training);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mismatched_models_rejected() {
        let options = TrainingOptions::default();
        let cohort = diabetes_cohort(120, 3);
        let model = ForestModel::train(&cohort, Condition::Diabetes, RandomForest::new(small_forest()), &options)
            .expect("Should train");

        let result = RiskContext::new(
            (model.clone(), cohort.clone()),
            (model, cohort),
            ChartConfig::default(),
            ImportanceSource::Reference,
        );
        assert!(matches!(result, Err(ModelError::InvalidParameter(_))));
    }
}
