//! # AppHealth
//!
//! Patient risk-scoring dashboard for diabetes and hypertension.
//!
//! This crate provides:
//! - Random forest models trained on cohort CSVs, one per condition
//! - Per-patient risk probabilities with population comparison charts
//! - Terminal UI for local-only use, with a small assessment history
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (patient input, samples, cohorts, assessments)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (random forest, CSV, SQLite, artifacts)
//! - `application`: Use cases orchestrating domain and ports
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use config::Config;
pub use domain::{Condition, PatientInput, RiskAssessment, RiskBand};

/// Result type for AppHealth operations
pub type Result<T> = std::result::Result<T, AppHealthError>;

/// Main error type for AppHealth
#[derive(Debug, thiserror::Error)]
pub enum AppHealthError {
    #[error("Cohort error: {0}")]
    Cohort(#[from] domain::CohortError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Model artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Artifact holds a {found} model where {expected} was expected")]
    ConditionMismatch {
        expected: domain::Condition,
        found: domain::Condition,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
