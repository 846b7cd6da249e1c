//! Label encoding for categorical feature columns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Maps category strings to dense integer codes.
///
/// Classes are sorted lexicographically and numbered from 0, so the mapping
/// only depends on the set of values seen during fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the sorted set of classes.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_owned).collect(),
        }
    }

    /// Code for `value`, or `None` for a category not seen during fitting.
    #[must_use]
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Category key for a numeric value arriving at a categorical column.
///
/// Integral values print without a fractional part so `1.0` matches `"1"`.
#[must_use]
pub fn category_key(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
