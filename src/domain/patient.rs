//! Patient form input and per-condition feature preparation.
//!
//! The form collects five self-reported values. Each condition's model sees
//! exactly three of them (some derived), in a fixed column order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conditions scored by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Diabetes,
    Hypertension,
}

impl Condition {
    /// Every condition, in display order.
    pub const ALL: [Condition; 2] = [Condition::Diabetes, Condition::Hypertension];

    /// Model input columns, in the order the model was trained on.
    #[must_use]
    pub fn feature_names(self) -> &'static [&'static str; 3] {
        match self {
            Self::Diabetes => &DIABETES_FEATURES,
            Self::Hypertension => &HYPERTENSION_FEATURES,
        }
    }

    /// Binary label column in the cohort table.
    #[must_use]
    pub fn label_column(self) -> &'static str {
        match self {
            Self::Diabetes => "Diabetes",
            Self::Hypertension => "target",
        }
    }

    /// File name of the cohort CSV inside the data directory.
    #[must_use]
    pub fn dataset_file(self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes_data.csv",
            Self::Hypertension => "hypertension_data.csv",
        }
    }

    /// Stable identifier used in file names and storage.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::Hypertension => "hypertension",
        }
    }

    /// Importance values published with the reference models, aligned with
    /// [`Condition::feature_names`].
    #[must_use]
    pub fn reference_importances(self) -> [f64; 3] {
        match self {
            Self::Diabetes => [0.2117133332645621, 0.15305638261809465, 0.11646282783471759],
            Self::Hypertension => [0.1491391772301424, 0.13647081077164086, 0.12473399197765939],
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diabetes => write!(f, "Diabetes"),
            Self::Hypertension => write!(f, "Hypertension"),
        }
    }
}

const DIABETES_FEATURES: [&str; 3] = ["BMI", "Age", "GenHlth"];
const HYPERTENSION_FEATURES: [&str; 3] = ["cp", "thalach", "oldpeak"];

/// Display labels for the 13 age bands, index `code - 1`.
pub const AGE_BAND_LABELS: [&str; 13] = [
    "0-24", "25-29", "30-34", "35-39", "40-44", "45-49", "50-54", "55-59", "60-64", "65-69",
    "70-74", "75-79", "80+",
];

/// Errors raised while turning form values into model samples.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Please complete all fields before continuing.")]
    IncompleteForm,

    #[error("Invalid patient data: {}", .0.join(", "))]
    OutOfRange(Vec<String>),

    #[error("Age {0} does not fall in any age band")]
    NoAgeBand(i32),
}

/// Raw values as submitted through the form.
///
/// `age` and `bmi` are free-text inputs and may be missing; the remaining
/// fields are sliders/radio buttons and always carry a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    /// Age in years
    pub age: Option<i32>,

    /// Body mass index (kg / m^2)
    pub bmi: Option<f64>,

    /// Self-rated general health, 1 (excellent) to 5 (poor)
    pub general_health: u8,

    /// Chest pain category: 0 none, 1 non-anginal, 2 atypical angina, 3 typical angina
    pub chest_pain: u8,

    /// Chest pain or tightness during exercise, 0 (none) to 6 (forces a stop)
    pub exercise_pain: f64,
}

impl Default for PatientInput {
    fn default() -> Self {
        Self {
            age: None,
            bmi: None,
            general_health: 3,
            chest_pain: 0,
            exercise_pain: 3.0,
        }
    }
}

impl PatientInput {
    /// Check that required fields are present and every value is in its domain.
    ///
    /// # Errors
    /// `IncompleteForm` when age or BMI is missing (checked first), otherwise
    /// `OutOfRange` listing every offending field.
    pub fn validate(&self) -> Result<(i32, f64), InputError> {
        let (Some(age), Some(bmi)) = (self.age, self.bmi) else {
            return Err(InputError::IncompleteForm);
        };

        let mut errors = Vec::new();

        if age < 0 {
            errors.push(format!("Age {age} must not be negative"));
        }
        if !bmi.is_finite() || bmi <= 0.0 {
            errors.push(format!("BMI {bmi} must be positive"));
        }
        if !(1..=5).contains(&self.general_health) {
            errors.push(format!(
                "General health {} out of range [1, 5]",
                self.general_health
            ));
        }
        if self.chest_pain > 3 {
            errors.push(format!("Chest pain {} out of range [0, 3]", self.chest_pain));
        }
        if !(0.0..=6.0).contains(&self.exercise_pain) {
            errors.push(format!(
                "Exercise pain {} out of range [0, 6]",
                self.exercise_pain
            ));
        }

        if errors.is_empty() {
            Ok((age, bmi))
        } else {
            Err(InputError::OutOfRange(errors))
        }
    }
}

/// Map an age in years to its band code (1-13).
///
/// Bands are `0-24`, then five-year bands from `25-29` to `75-79`, then `80+`.
/// Negative ages have no band.
#[must_use]
pub fn age_bucket(age: i32) -> Option<u8> {
    match age {
        i32::MIN..=-1 => None,
        0..=24 => Some(1),
        25..=79 => Some(((age - 25) / 5 + 2) as u8),
        _ => Some(13),
    }
}

/// Stand-in for maximum heart rate, which the form never asks for.
///
/// The hypertension cohort records a measured `thalach`; here it is
/// approximated as `200 - age`.
#[must_use]
pub fn max_heart_rate_proxy(age: i32) -> f64 {
    200.0 - f64::from(age)
}

/// Named, ordered feature values for one condition's model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSample {
    condition: Condition,
    names: Vec<String>,
    values: Vec<f64>,
}

impl PatientSample {
    /// Build a sample from `(name, value)` pairs kept in the given order.
    pub fn from_named<N: Into<String>>(
        condition: Condition,
        features: impl IntoIterator<Item = (N, f64)>,
    ) -> Self {
        let (names, values) = features
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Self {
            condition,
            names,
            values,
        }
    }

    /// Prepare the sample for `condition` from raw form values.
    ///
    /// # Errors
    /// Propagates validation errors; a negative age yields `NoAgeBand` if it
    /// ever reaches bucketing.
    pub fn prepare(input: &PatientInput, condition: Condition) -> Result<Self, InputError> {
        let (age, bmi) = input.validate()?;
        let names = condition.feature_names();

        let values = match condition {
            Condition::Diabetes => {
                let band = age_bucket(age).ok_or(InputError::NoAgeBand(age))?;
                [bmi, f64::from(band), f64::from(input.general_health)]
            }
            Condition::Hypertension => [
                f64::from(input.chest_pain),
                max_heart_rate_proxy(age),
                input.exercise_pain,
            ],
        };

        Ok(Self::from_named(
            condition,
            names.iter().copied().zip(values),
        ))
    }

    #[must_use]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a single named feature.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}
