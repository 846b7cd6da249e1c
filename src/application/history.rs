//! History service: recent assessments for the dashboard.

use std::sync::Arc;

use crate::domain::{RiskAssessment, RiskBand};
use crate::ports::Storage;
use crate::AppHealthError;

/// Dashboard summary over the stored history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecentSummary {
    /// Total stored assessments.
    pub total: usize,
    /// High-band counts among the loaded recent records.
    pub high_diabetes: usize,
    pub high_hypertension: usize,
    /// Newest first.
    pub recent: Vec<RiskAssessment>,
}

impl RecentSummary {
    #[must_use]
    pub fn latest(&self) -> Option<&RiskAssessment> {
        self.recent.first()
    }
}

/// Service over the assessment history store.
pub struct HistoryService<S: Storage> {
    storage: Arc<S>,
}

impl<S> HistoryService<S>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Persist an assessment.
    ///
    /// # Errors
    /// Returns error if the storage write fails.
    pub fn record(&self, assessment: &RiskAssessment) -> Result<(), AppHealthError> {
        self.storage
            .save_assessment(assessment)
            .map_err(|e| AppHealthError::Storage(e.into()))?;
        tracing::debug!(assessment_id = %assessment.id, "Assessment stored");
        Ok(())
    }

    /// Summarize the newest `limit` assessments.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn recent_summary(&self, limit: usize) -> Result<RecentSummary, AppHealthError> {
        let total = self
            .storage
            .count_assessments()
            .map_err(|e| AppHealthError::Storage(e.into()))?;
        let recent = self
            .storage
            .load_recent_assessments(limit)
            .map_err(|e| AppHealthError::Storage(e.into()))?;

        let high = |pick: fn(&RiskAssessment) -> RiskBand| {
            recent.iter().filter(|a| pick(a) == RiskBand::High).count()
        };

        Ok(RecentSummary {
            total,
            high_diabetes: high(|a| a.diabetes.band),
            high_hypertension: high(|a| a.hypertension.band),
            recent,
        })
    }

    /// Remove one assessment.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn delete(&self, id: &str) -> Result<(), AppHealthError> {
        self.storage
            .delete_assessment(id)
            .map_err(|e| AppHealthError::Storage(e.into()))
    }

    /// Remove every stored assessment.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn clear(&self) -> Result<(), AppHealthError> {
        self.storage
            .clear_all()
            .map_err(|e| AppHealthError::Storage(e.into()))?;
        tracing::info!("Assessment history cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::domain::{Condition, ConditionRisk};

    fn assessment(d: f64, h: f64) -> RiskAssessment {
        RiskAssessment::new(
            ConditionRisk::new(Condition::Diabetes, d, 0.5),
            ConditionRisk::new(Condition::Hypertension, h, 0.5),
        )
    }

    fn service() -> HistoryService<SqliteStorage> {
        HistoryService::new(Arc::new(SqliteStorage::in_memory().expect("Should open")))
    }

    #[test]
    fn test_summary_counts_high_bands() {
        let history = service();
        history.record(&assessment(0.8, 0.2)).expect("Should record");
        history.record(&assessment(0.5, 0.9)).expect("Should record");
        history.record(&assessment(0.7, 0.6)).expect("Should record");

        let summary = history.recent_summary(10).expect("Should summarize");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.high_diabetes, 2);
        assert_eq!(summary.high_hypertension, 2);
        assert_eq!(summary.recent.len(), 3);
        assert!(summary.latest().is_some());
    }

    #[test]
    fn test_limit_caps_recent_but_not_total() {
        let history = service();
        for _ in 0..4 {
            history.record(&assessment(0.1, 0.1)).expect("Should record");
        }
        let summary = history.recent_summary(2).expect("Should summarize");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.recent.len(), 2);
    }

    #[test]
    fn test_delete_and_clear() {
        let history = service();
        let first = assessment(0.9, 0.9);
        history.record(&first).expect("Should record");
        history.record(&assessment(0.1, 0.1)).expect("Should record");

        history.delete(&first.id).expect("Should delete");
        assert_eq!(history.recent_summary(10).expect("Should summarize").total, 1);

        history.clear().expect("Should clear");
        let summary = history.recent_summary(10).expect("Should summarize");
        assert_eq!(summary, RecentSummary::default());
    }
}
