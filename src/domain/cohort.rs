//! Historical cohort tables.
//!
//! A cohort is loaded once, cleaned (median imputation of numeric columns)
//! and then shared read-only for training and population charts.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Cell tokens treated as missing values.
const MISSING_TOKENS: [&str; 10] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-nan", "null", "NULL", "None",
];

/// Errors raised while building or querying a cohort.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CohortError {
    #[error("Cohort has no rows")]
    Empty,

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {0} is not numeric")]
    NotNumeric(String),

    #[error("Row {row} has {got} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("Failed to read cohort {path}: {reason}")]
    Read { path: String, reason: String },
}

/// A single typed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Column {
    /// Every present cell parsed as a number; missing cells hold the median.
    Numeric(Vec<f64>),
    /// Free-form categories; missing cells hold `"nan"`.
    Categorical(Vec<String>),
}

impl Column {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented cohort table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortDataset {
    headers: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl CohortDataset {
    /// Build a cleaned dataset from raw string records.
    ///
    /// Column types are inferred: a column is numeric when every present cell
    /// parses as a float. Missing numeric cells are replaced with the column
    /// median (NaN if the column has no values at all).
    ///
    /// # Errors
    /// `Empty` for zero rows, `RaggedRow` when a record's width differs from
    /// the header.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self, CohortError> {
        if records.is_empty() {
            return Err(CohortError::Empty);
        }

        let width = headers.len();
        for (row, record) in records.iter().enumerate() {
            if record.len() != width {
                return Err(CohortError::RaggedRow {
                    row,
                    got: record.len(),
                    expected: width,
                });
            }
        }

        let columns = (0..width)
            .map(|col| build_column(records.iter().map(|r| r[col].trim())))
            .collect();

        Ok(Self {
            headers,
            columns,
            rows: records.len(),
        })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Look up a column by header name.
    ///
    /// # Errors
    /// `MissingColumn` when no header matches.
    pub fn column(&self, name: &str) -> Result<&Column, CohortError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| CohortError::MissingColumn(name.to_string()))
    }

    /// Values of a numeric column.
    ///
    /// # Errors
    /// `MissingColumn` or `NotNumeric`.
    pub fn numeric(&self, name: &str) -> Result<&[f64], CohortError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Categorical(_) => Err(CohortError::NotNumeric(name.to_string())),
        }
    }
}

impl CohortDataset {
    /// SHA-256 hex digest of the cleaned table: headers, column types and
    /// every cell. Equal cohorts give equal fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.rows as u64).to_le_bytes());
        for (header, column) in self.headers.iter().zip(&self.columns) {
            hasher.update(header.as_bytes());
            hasher.update([0u8]);
            match column {
                Column::Numeric(values) => {
                    hasher.update(b"n");
                    for v in values {
                        hasher.update(v.to_bits().to_le_bytes());
                    }
                }
                Column::Categorical(values) => {
                    hasher.update(b"c");
                    for v in values {
                        hasher.update(v.as_bytes());
                        hasher.update([0u8]);
                    }
                }
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

fn build_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .clone()
        .map(|cell| {
            if is_missing(cell) {
                Some(None)
            } else {
                cell.parse::<f64>().ok().map(Some)
            }
        })
        .collect();

    match parsed {
        Some(values) => {
            let fill = median(values.iter().flatten().copied().collect());
            Column::Numeric(values.into_iter().map(|v| v.unwrap_or(fill)).collect())
        }
        None => Column::Categorical(
            cells
                .map(|cell| {
                    if is_missing(cell) {
                        "nan".to_string()
                    } else {
                        cell.to_string()
                    }
                })
                .collect(),
        ),
    }
}

/// Median of the values; mean of the two middle values for even counts.
fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_median_imputation() {
        let cohort = CohortDataset::from_records(
            strings(&["BMI", "Diabetes"]),
            vec![
                strings(&["20", "0"]),
                strings(&["", "1"]),
                strings(&["30", "1"]),
                strings(&["NA", "0"]),
                strings(&["40", "0"]),
            ],
        )
        .expect("Should build");

        assert_eq!(cohort.len(), 5);
        assert_eq!(
            cohort.numeric("BMI").expect("Should be numeric"),
            [20.0, 30.0, 30.0, 30.0, 40.0]
        );
    }

    #[test]
    fn test_even_count_median() {
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(Vec::new()).is_nan());
    }

    #[test]
    fn test_categorical_column_inferred() {
        let cohort = CohortDataset::from_records(
            strings(&["cp", "target"]),
            vec![
                strings(&["typical", "1"]),
                strings(&["", "0"]),
                strings(&["2", "1"]),
            ],
        )
        .expect("Should build");

        assert_eq!(
            cohort.column("cp").expect("Should exist"),
            &Column::Categorical(strings(&["typical", "nan", "2"]))
        );
        assert_eq!(
            cohort.numeric("cp"),
            Err(CohortError::NotNumeric("cp".to_string()))
        );
    }

    #[test]
    fn test_missing_column() {
        let cohort = CohortDataset::from_records(strings(&["a"]), vec![strings(&["1"])])
            .expect("Should build");
        assert_eq!(
            cohort.numeric("b"),
            Err(CohortError::MissingColumn("b".to_string()))
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let build = |bmi: &str| {
            CohortDataset::from_records(
                strings(&["BMI", "Diabetes"]),
                vec![strings(&["20", "0"]), strings(&[bmi, "1"])],
            )
            .expect("Should build")
        };

        assert_eq!(build("31").fingerprint(), build("31").fingerprint());
        assert_ne!(build("31").fingerprint(), build("32").fingerprint());
        assert_eq!(build("31").fingerprint().len(), 64);
    }

    #[test]
    fn test_ragged_and_empty_rejected() {
        assert_eq!(
            CohortDataset::from_records(strings(&["a"]), Vec::new()),
            Err(CohortError::Empty)
        );
        assert!(matches!(
            CohortDataset::from_records(strings(&["a", "b"]), vec![strings(&["1"])]),
            Err(CohortError::RaggedRow { row: 0, got: 1, expected: 2 })
        ));
    }
}
