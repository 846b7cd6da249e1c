//! CSV adapter: Implementation of CohortSource.
//!
//! Reads `<data_dir>/<condition file>` with a header row. Typing and median
//! imputation happen in [`CohortDataset::from_records`].

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::domain::{CohortDataset, CohortError, Condition};
use crate::ports::CohortSource;

/// Loads cohort tables from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvCohortSource {
    data_dir: PathBuf,
}

impl CsvCohortSource {
    #[must_use]
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the cohort file for `condition`.
    #[must_use]
    pub fn path_for(&self, condition: Condition) -> PathBuf {
        self.data_dir.join(condition.dataset_file())
    }

    /// Parse a cohort from any reader (comma-delimited, header row).
    ///
    /// # Errors
    /// `Read` on malformed CSV, otherwise whatever dataset construction reports.
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<CohortDataset, CohortError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let read_error = |e: csv::Error| CohortError::Read {
            path: origin.to_string(),
            reason: e.to_string(),
        };

        let headers: Vec<String> = rdr
            .headers()
            .map_err(read_error)?
            .iter()
            .map(str::to_owned)
            .collect();

        let records = rdr
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_owned).collect::<Vec<String>>())
                    .map_err(read_error)
            })
            .collect::<Result<Vec<_>, _>>()?;

        CohortDataset::from_records(headers, records)
    }
}

impl CohortSource for CsvCohortSource {
    fn load(&self, condition: Condition) -> Result<CohortDataset, CohortError> {
        let path = self.path_for(condition);
        let origin = path.display().to_string();

        let file = std::fs::File::open(&path).map_err(|e| CohortError::Read {
            path: origin.clone(),
            reason: e.to_string(),
        })?;

        let dataset = Self::from_reader(std::io::BufReader::new(file), &origin)?;
        tracing::info!(
            %condition,
            rows = dataset.len(),
            columns = dataset.headers().len(),
            "Loaded cohort"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIABETES_CSV: &str = "\
Diabetes,HighBP,BMI,Age,GenHlth
0,1,26.0,4,3
1,1,,9,4
0,0,24.0,7,2
1,1,30.0,11,5
";

    #[test]
    fn test_from_reader_parses_and_imputes() {
        let cohort =
            CsvCohortSource::from_reader(DIABETES_CSV.as_bytes(), "inline").expect("Should parse");

        assert_eq!(cohort.len(), 4);
        assert_eq!(cohort.headers(), ["Diabetes", "HighBP", "BMI", "Age", "GenHlth"]);
        assert_eq!(
            cohort.numeric("BMI").expect("Should be numeric"),
            [26.0, 26.0, 24.0, 30.0]
        );
        assert_eq!(
            cohort.numeric("Diabetes").expect("Should be numeric"),
            [0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_short_row_reported() {
        let csv = "a,b\n1,2\n3\n";
        let err = CsvCohortSource::from_reader(csv.as_bytes(), "inline").expect_err("Should fail");
        assert!(matches!(err, CohortError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let source = CsvCohortSource::new("/nonexistent/apphealth-data");
        let err = source.load(Condition::Diabetes).expect_err("Should fail");
        match err {
            CohortError::Read { path, .. } => assert!(path.ends_with("diabetes_data.csv")),
            other => panic!("Expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_directory() {
        let dir = std::env::temp_dir().join(format!("apphealth-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("Should create dir");
        std::fs::write(dir.join("hypertension_data.csv"), "age,cp,thalach,oldpeak,target\n63,3,150,2.3,1\n37,2,187,3.5,0\n")
            .expect("Should write");

        let cohort = CsvCohortSource::new(&dir)
            .load(Condition::Hypertension)
            .expect("Should load");
        assert_eq!(cohort.len(), 2);
        assert_eq!(cohort.numeric("oldpeak").expect("Should be numeric"), [2.3, 3.5]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bundled_cohorts_load() {
        let source = CsvCohortSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"));
        for condition in Condition::ALL {
            let cohort = source.load(condition).expect("Should load bundled cohort");
            assert!(!cohort.is_empty());
            for name in condition.feature_names() {
                let values = cohort.numeric(name).expect("Feature should be numeric");
                assert!(values.iter().all(|v| v.is_finite()));
            }
            cohort
                .numeric(condition.label_column())
                .expect("Label should be numeric");
        }
    }
}
