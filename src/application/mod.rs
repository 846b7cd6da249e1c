//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application: training and scoring models,
//! mapping results to charts, and keeping assessment history.

pub mod charts;
mod context;
mod history;
mod model;

#[cfg(test)]
mod fixtures;

pub use charts::{Chart, ChartConfig, ChartKind};
pub use context::{Assessment, AssessmentError, ImportanceSource, RiskContext, StartupStep};
pub use history::{HistoryService, RecentSummary};
pub use model::{
    train_test_split, ForestModel, TrainedModel, TrainingMetrics, TrainingOptions,
    DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION,
};
