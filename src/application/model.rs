//! Model training and inference.
//!
//! A [`TrainedModel`] binds a fitted classifier to the ordered feature names
//! and label encoders it was trained with. Samples are checked against that
//! schema before every prediction.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::adapters::forest::{ForestParams, RandomForest};
use crate::domain::{category_key, CohortDataset, CohortError, Column, Condition, LabelEncoder, PatientSample};
use crate::ports::{Classifier, ModelError};

/// Default held-out fraction.
pub const DEFAULT_TEST_FRACTION: f64 = 0.3;

/// Default seed for the train/test permutation.
pub const DEFAULT_SPLIT_SEED: u64 = 123;

/// Probability above which the model predicts the positive class.
const DECISION_THRESHOLD: f64 = 0.5;

/// How the cohort is split before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }
}

/// Figures recorded at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_rows: usize,
    pub test_rows: usize,
    /// Accuracy on the held-out rows; `None` when nothing was held out.
    pub holdout_accuracy: Option<f64>,
}

/// The model type used by the dashboard.
pub type ForestModel = TrainedModel<RandomForest>;

/// A fitted classifier together with its input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel<C> {
    condition: Condition,
    feature_names: Vec<String>,
    encoders: BTreeMap<String, LabelEncoder>,
    classifier: C,
    metrics: TrainingMetrics,
    /// Split settings the model was trained with.
    #[serde(default)]
    options: TrainingOptions,
    /// [`CohortDataset::fingerprint`] of the training cohort. Empty for
    /// artifacts written before it was recorded.
    #[serde(default)]
    cohort_fingerprint: String,
}

/// Seeded permutation split into `(train, test)` row indices.
///
/// The test set holds `ceil(test_fraction * n)` rows.
///
/// # Errors
/// `InvalidParameter` for a fraction outside `[0, 1)`, `InsufficientData`
/// when no rows would remain for training.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), ModelError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(ModelError::InvalidParameter(format!(
            "test fraction {test_fraction} outside [0, 1)"
        )));
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test >= n {
        return Err(ModelError::InsufficientData(n));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));

    let train = permutation.split_off(n_test);
    Ok((train, permutation))
}

fn binary_labels(values: &[f64]) -> Result<Vec<u8>, ModelError> {
    values
        .iter()
        .map(|&v| {
            if v == 0.0 {
                Ok(0)
            } else if v == 1.0 {
                Ok(1)
            } else {
                Err(ModelError::InvalidLabel(v))
            }
        })
        .collect()
}

fn encode_value(feature: &str, encoder: &LabelEncoder, value: &str) -> Result<f64, ModelError> {
    encoder
        .transform(value)
        .map(|code| code as f64)
        .ok_or_else(|| ModelError::UnknownCategory {
            feature: feature.to_string(),
            value: value.to_string(),
        })
}

/// Transpose feature columns into row vectors.
fn to_rows(columns: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect()
}

impl<C: Classifier> TrainedModel<C> {
    /// Train `classifier` on the cohort's features for `condition`.
    ///
    /// Categorical feature columns are label-encoded and the encoders are
    /// kept with the model.
    ///
    /// # Errors
    /// Missing columns, non-binary labels, an empty training split or any
    /// classifier failure.
    pub fn train(
        cohort: &CohortDataset,
        condition: Condition,
        mut classifier: C,
        options: &TrainingOptions,
    ) -> Result<Self, ModelError> {
        let feature_names: Vec<String> =
            condition.feature_names().iter().map(|s| s.to_string()).collect();

        let mut encoders = BTreeMap::new();
        let mut columns = Vec::with_capacity(feature_names.len());
        for name in &feature_names {
            let values = match cohort.column(name)? {
                Column::Numeric(values) => values.clone(),
                Column::Categorical(values) => {
                    let encoder = LabelEncoder::fit(values.iter().map(String::as_str));
                    let encoded = values
                        .iter()
                        .map(|v| encode_value(name, &encoder, v))
                        .collect::<Result<Vec<_>, _>>()?;
                    tracing::debug!(feature = %name, classes = encoder.classes().len(), "Label-encoded feature");
                    encoders.insert(name.clone(), encoder);
                    encoded
                }
            };
            columns.push(values);
        }

        let labels = binary_labels(cohort.numeric(condition.label_column())?)?;
        let rows = to_rows(&columns, cohort.len());

        let (train_idx, test_idx) =
            train_test_split(rows.len(), options.test_fraction, options.split_seed)?;

        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
        classifier.fit(&train_rows, &train_labels)?;

        let holdout_accuracy = if test_idx.is_empty() {
            None
        } else {
            let mut correct = 0usize;
            for &i in &test_idx {
                let predicted = u8::from(classifier.predict_proba(&rows[i])? > DECISION_THRESHOLD);
                if predicted == labels[i] {
                    correct += 1;
                }
            }
            Some(correct as f64 / test_idx.len() as f64)
        };

        let metrics = TrainingMetrics {
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            holdout_accuracy,
        };

        tracing::info!(
            %condition,
            train_rows = metrics.train_rows,
            test_rows = metrics.test_rows,
            accuracy = metrics.holdout_accuracy.unwrap_or(f64::NAN),
            "Model trained"
        );

        Ok(Self {
            condition,
            feature_names,
            encoders,
            classifier,
            metrics,
            options: *options,
            cohort_fingerprint: cohort.fingerprint(),
        })
    }

    #[must_use]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    #[must_use]
    pub fn training_options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Whether this model was trained on exactly `cohort` with `options`.
    #[must_use]
    pub fn trained_on(&self, cohort: &CohortDataset, options: &TrainingOptions) -> bool {
        self.options == *options && self.cohort_fingerprint == cohort.fingerprint()
    }

    #[must_use]
    pub fn encoder(&self, feature: &str) -> Option<&LabelEncoder> {
        self.encoders.get(feature)
    }

    /// Verify that `sample` carries exactly this model's features, in order.
    ///
    /// # Errors
    /// `SchemaMismatch` on any difference in names or order.
    pub fn check_schema(&self, sample: &PatientSample) -> Result<(), ModelError> {
        if sample.feature_names() != self.feature_names.as_slice() {
            return Err(ModelError::SchemaMismatch {
                expected: self.feature_names.clone(),
                got: sample.feature_names().to_vec(),
            });
        }
        Ok(())
    }

    fn encode_sample(&self, sample: &PatientSample) -> Result<Vec<f64>, ModelError> {
        self.feature_names
            .iter()
            .zip(sample.values())
            .map(|(name, &value)| match self.encoders.get(name) {
                Some(encoder) => encode_value(name, encoder, &category_key(value)),
                None => Ok(value),
            })
            .collect()
    }

    /// Positive-class probability for one patient sample.
    ///
    /// # Errors
    /// `SchemaMismatch`, `UnknownCategory`, or a classifier failure.
    pub fn predict_probability(&self, sample: &PatientSample) -> Result<f64, ModelError> {
        self.check_schema(sample)?;
        let row = self.encode_sample(sample)?;
        self.classifier.predict_proba(&row)
    }

    /// Model feature columns of `cohort`, encoded the way the model saw them
    /// during training.
    ///
    /// # Errors
    /// Missing or mistyped columns, unseen categories.
    pub fn encoded_columns(&self, cohort: &CohortDataset) -> Result<Vec<Vec<f64>>, ModelError> {
        self.feature_names
            .iter()
            .map(|name| -> Result<Vec<f64>, ModelError> {
                match (cohort.column(name)?, self.encoders.get(name)) {
                    (Column::Numeric(values), None) => Ok(values.clone()),
                    (Column::Numeric(values), Some(encoder)) => values
                        .iter()
                        .map(|&v| encode_value(name, encoder, &category_key(v)))
                        .collect(),
                    (Column::Categorical(values), Some(encoder)) => values
                        .iter()
                        .map(|v| encode_value(name, encoder, v))
                        .collect(),
                    (Column::Categorical(_), None) => {
                        Err(CohortError::NotNumeric(name.clone()).into())
                    }
                }
            })
            .collect()
    }

    /// Positive-class probability for every row of a cohort.
    ///
    /// # Errors
    /// Missing or mistyped columns, unseen categories, classifier failures.
    pub fn predict_cohort(&self, cohort: &CohortDataset) -> Result<Vec<f64>, ModelError> {
        let columns = self.encoded_columns(cohort)?;
        to_rows(&columns, cohort.len())
            .iter()
            .map(|row| self.classifier.predict_proba(row))
            .collect()
    }

    /// Impurity-based importance per feature, in model column order.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.classifier.feature_importances())
            .collect()
    }
}

impl ForestModel {
    /// Whether a saved model is still valid for the current settings and
    /// cohort. A stale model must be retrained before it is served.
    #[must_use]
    pub fn is_current(
        &self,
        forest: &ForestParams,
        options: &TrainingOptions,
        cohort: &CohortDataset,
    ) -> bool {
        self.classifier.params() == forest && self.trained_on(cohort, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fixtures;

    fn diabetes_model() -> ForestModel {
        TrainedModel::train(
            &fixtures::diabetes_cohort(200, 5),
            Condition::Diabetes,
            RandomForest::new(fixtures::small_forest()),
            &TrainingOptions::default(),
        )
        .expect("Should train")
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let (train, test) = train_test_split(10, 0.3, 123).expect("Should split");
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(train_test_split(10, 0.3, 123).expect("Should split"), (train, test));
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        let (train, test) = train_test_split(11, 0.3, 1).expect("Should split");
        assert_eq!(test.len(), 4);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn test_split_rejects_degenerate_inputs() {
        assert_eq!(train_test_split(1, 0.3, 123), Err(ModelError::InsufficientData(1)));
        assert!(matches!(
            train_test_split(10, 1.0, 123),
            Err(ModelError::InvalidParameter(_))
        ));
        let (train, test) = train_test_split(5, 0.0, 123).expect("Should split");
        assert_eq!((train.len(), test.len()), (5, 0));
    }

    #[test]
    fn test_train_records_metrics() {
        let model = diabetes_model();
        assert_eq!(model.condition(), Condition::Diabetes);
        assert_eq!(model.feature_names(), ["BMI", "Age", "GenHlth"]);
        assert_eq!(model.metrics().test_rows, 60);
        assert_eq!(model.metrics().train_rows, 140);

        let accuracy = model.metrics().holdout_accuracy.expect("Should have accuracy");
        assert!(accuracy > 0.6, "accuracy = {accuracy}");
    }

    #[test]
    fn test_model_is_current_only_for_its_inputs() {
        let model = diabetes_model();
        let cohort = fixtures::diabetes_cohort(200, 5);
        let options = TrainingOptions::default();
        let forest = fixtures::small_forest();
        assert!(model.is_current(&forest, &options, &cohort));

        let fewer_trees = ForestParams { n_trees: 5, ..forest };
        assert!(!model.is_current(&fewer_trees, &options, &cohort));
        let resplit = TrainingOptions { test_fraction: 0.2, ..options };
        assert!(!model.is_current(&forest, &resplit, &cohort));
        assert!(!model.is_current(&forest, &options, &fixtures::diabetes_cohort(200, 6)));
    }

    #[test]
    fn test_artifact_without_provenance_is_stale() {
        let model = diabetes_model();
        let mut json = serde_json::to_value(&model).expect("Should serialize");
        let fields = json.as_object_mut().expect("Should be an object");
        fields.remove("options");
        fields.remove("cohort_fingerprint");

        let restored: ForestModel = serde_json::from_value(json).expect("Should deserialize");
        let cohort = fixtures::diabetes_cohort(200, 5);
        assert!(!restored.is_current(&fixtures::small_forest(), &TrainingOptions::default(), &cohort));
    }

    #[test]
    fn test_predict_scenario_sample() {
        let model = diabetes_model();
        let sample = PatientSample::prepare(&fixtures::scenario_input(), Condition::Diabetes)
            .expect("Should prepare");
        let p = model.predict_probability(&sample).expect("Should predict");
        assert!(p.is_finite() && (0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_schema_mismatch_is_reported() {
        let model = diabetes_model();

        let reordered = PatientSample::from_named(
            Condition::Diabetes,
            [("Age", 6.0), ("BMI", 28.5), ("GenHlth", 2.0)],
        );
        assert!(matches!(
            model.predict_probability(&reordered),
            Err(ModelError::SchemaMismatch { .. })
        ));

        let wrong_condition =
            PatientSample::prepare(&fixtures::scenario_input(), Condition::Hypertension)
                .expect("Should prepare");
        assert!(matches!(
            model.check_schema(&wrong_condition),
            Err(ModelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_cohort_covers_every_row() {
        let cohort = fixtures::diabetes_cohort(50, 9);
        let probabilities = diabetes_model().predict_cohort(&cohort).expect("Should predict");
        assert_eq!(probabilities.len(), 50);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_importances_follow_feature_order() {
        let importances = diabetes_model().feature_importances();
        let names: Vec<&str> = importances.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["BMI", "Age", "GenHlth"]);
        let total: f64 = importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_categorical_feature_is_encoded_and_persisted() {
        let headers = ["cp", "thalach", "oldpeak", "target"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = (0..30)
            .map(|i| {
                let cp = ["atypical", "none", "typical"][i % 3];
                vec![
                    cp.to_string(),
                    (120 + i).to_string(),
                    format!("{}.0", i % 4),
                    u8::from(i % 3 == 2).to_string(),
                ]
            })
            .collect();
        let cohort = CohortDataset::from_records(headers, records).expect("Should build");

        let model = TrainedModel::train(
            &cohort,
            Condition::Hypertension,
            RandomForest::new(fixtures::small_forest()),
            &TrainingOptions::default(),
        )
        .expect("Should train");

        let encoder = model.encoder("cp").expect("cp should be encoded");
        assert_eq!(encoder.classes(), ["atypical", "none", "typical"]);
        assert_eq!(model.predict_cohort(&cohort).expect("Should predict").len(), 30);

        // A numeric chest-pain code was never seen as a category.
        let sample = PatientSample::from_named(
            Condition::Hypertension,
            [("cp", 1.0), ("thalach", 155.0), ("oldpeak", 3.0)],
        );
        assert_eq!(
            model.predict_probability(&sample),
            Err(ModelError::UnknownCategory {
                feature: "cp".to_string(),
                value: "1".to_string(),
            })
        );

        let json = serde_json::to_string(&model).expect("Should serialize");
        let restored: ForestModel = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(restored.encoder("cp"), Some(encoder));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let headers = ["BMI", "Age", "GenHlth", "Diabetes"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = vec![
            vec!["25".into(), "3".into(), "2".into(), "0".into()],
            vec!["31".into(), "8".into(), "4".into(), "2".into()],
            vec!["28".into(), "5".into(), "3".into(), "1".into()],
        ];
        let cohort = CohortDataset::from_records(headers, records).expect("Should build");

        let result = TrainedModel::train(
            &cohort,
            Condition::Diabetes,
            RandomForest::new(fixtures::small_forest()),
            &TrainingOptions::default(),
        );
        assert!(matches!(result, Err(ModelError::InvalidLabel(v)) if v == 2.0));
    }

    #[test]
    fn test_missing_feature_column() {
        let cohort = fixtures::hypertension_cohort(40, 2);
        let result = TrainedModel::train(
            &cohort,
            Condition::Diabetes,
            RandomForest::new(fixtures::small_forest()),
            &TrainingOptions::default(),
        );
        assert!(matches!(
            result,
            Err(ModelError::Cohort(CohortError::MissingColumn(_)))
        ));
    }
}
