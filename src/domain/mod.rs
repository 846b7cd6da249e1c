//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O. Form input, per-condition samples, cohort
//! tables, label encoders and scored assessments.

mod assessment;
mod cohort;
mod encoding;
mod patient;

pub use assessment::{ConditionRisk, RiskAssessment, RiskBand, DEFAULT_RISK_THRESHOLD};
pub use cohort::{CohortDataset, CohortError, Column};
pub use encoding::{category_key, LabelEncoder};
pub use patient::{
    age_bucket, max_heart_rate_proxy, Condition, InputError, PatientInput, PatientSample,
    AGE_BAND_LABELS,
};
