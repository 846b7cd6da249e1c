//! Classifier port: Trait for binary probability classifiers.
//!
//! Abstracts the learning algorithm (random forest) from model training
//! and the risk pipeline.

use crate::domain::CohortError;

/// Errors that can occur while training or querying a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Not enough rows to hold out a test split: {0}")]
    InsufficientData(usize),

    #[error("Feature count mismatch: got {got}, expected {expected}")]
    FeatureCount { got: usize, expected: usize },

    #[error("Feature schema mismatch: expected {expected:?}, got {got:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Label {0} is not binary (expected 0 or 1)")]
    InvalidLabel(f64),

    #[error("Unknown category {value:?} for feature {feature}")]
    UnknownCategory { feature: String, value: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Cohort error: {0}")]
    Cohort(#[from] CohortError),
}

/// Trait for binary classifiers that output a positive-class probability.
///
/// Rows are dense feature vectors in a fixed column order; labels are 0/1.
pub trait Classifier: Send + Sync {
    /// Fit the classifier on the given rows.
    ///
    /// # Errors
    /// Returns error on empty input, ragged rows or non-binary labels.
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError>;

    /// Probability that `row` belongs to class 1, in `[0, 1]`.
    ///
    /// # Errors
    /// Returns error if unfitted or the row width differs from training.
    fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError>;

    /// Number of features seen during fitting (0 when unfitted).
    fn n_features(&self) -> usize;

    /// Relative importance of each feature, summing to 1 when any split exists.
    fn feature_importances(&self) -> Vec<f64>;
}
