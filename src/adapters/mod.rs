//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `forest`: random forest classifier
//! - `csv`: cohort tables from CSV files
//! - `sqlite`: SQLite assessment history
//! - `artifacts`: JSON model artifacts with SHA-256 manifest
//! - `sanitize`: patient-data filtering for logs

pub mod artifacts;
pub mod csv;
pub mod forest;
pub mod sanitize;
pub mod sqlite;

pub use artifacts::{ArtifactError, JsonModelStore};
pub use sqlite::StorageError;
