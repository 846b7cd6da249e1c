//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (learning algorithm,
//! cohort files, storage).

mod classifier;
mod cohort_source;
mod storage;

pub use classifier::{Classifier, ModelError};
pub use cohort_source::CohortSource;
pub use storage::Storage;
