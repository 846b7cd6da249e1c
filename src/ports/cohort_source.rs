//! Cohort source port: Trait for loading historical cohort tables.

use crate::domain::{CohortDataset, CohortError, Condition};

/// Trait for loading the cohort that backs a condition's model.
pub trait CohortSource: Send + Sync {
    /// Load and clean the cohort for `condition`.
    ///
    /// # Errors
    /// Returns error if the table cannot be read or is malformed.
    fn load(&self, condition: Condition) -> Result<CohortDataset, CohortError>;
}
