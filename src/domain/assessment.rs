//! Risk assessment types.
//!
//! Represents the scored outcome of one form submission.

use serde::{Deserialize, Serialize};

use super::patient::Condition;

/// Probability above which a condition is flagged as high risk.
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.5;

/// Binary risk band used for colors and history summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    /// At or below the threshold
    Low,
    /// Strictly above the threshold
    High,
}

impl RiskBand {
    /// Classify a probability. Exactly at the threshold counts as low.
    #[must_use]
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Self::High
        } else {
            Self::Low
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - No significant indicators",
            Self::High => "High risk - Consultation advised",
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Probability and band for a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionRisk {
    pub condition: Condition,

    /// Positive-class probability (0.0 to 1.0)
    pub probability: f64,

    pub band: RiskBand,
}

impl ConditionRisk {
    #[must_use]
    pub fn new(condition: Condition, probability: f64, threshold: f64) -> Self {
        Self {
            condition,
            probability,
            band: RiskBand::from_probability(probability, threshold),
        }
    }
}

/// One scored submission. Holds no raw patient inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Unique identifier
    pub id: String,

    pub diabetes: ConditionRisk,

    pub hypertension: ConditionRisk,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RiskAssessment {
    #[must_use]
    pub fn new(diabetes: ConditionRisk, hypertension: ConditionRisk) -> Self {
        Self {
            id: uuid_v4(),
            diabetes,
            hypertension,
            created_at: chrono::Utc::now(),
        }
    }

    /// Risk for the given condition.
    #[must_use]
    pub fn risk(&self, condition: Condition) -> &ConditionRisk {
        match condition {
            Condition::Diabetes => &self.diabetes,
            Condition::Hypertension => &self.hypertension,
        }
    }
}

/// Generate a random UUID v4 from a ChaCha20 CSPRNG seeded by the OS.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
