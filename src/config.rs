//! Runtime configuration.
//!
//! Every setting has a default; environment variables override them on a
//! best-effort basis. Values that do not parse or fall outside their valid
//! range are ignored.

use std::path::PathBuf;

use crate::adapters::forest::ForestParams;
use crate::application::{ChartConfig, ImportanceSource, TrainingOptions};

pub const DATA_DIR_ENV: &str = "APPHEALTH_DATA_DIR";
pub const MODEL_DIR_ENV: &str = "APPHEALTH_MODEL_DIR";
pub const DB_PATH_ENV: &str = "APPHEALTH_DB_PATH";
pub const FOREST_TREES_ENV: &str = "APPHEALTH_FOREST_TREES";
pub const FOREST_SEED_ENV: &str = "APPHEALTH_FOREST_SEED";
pub const SPLIT_SEED_ENV: &str = "APPHEALTH_SPLIT_SEED";
pub const TEST_FRACTION_ENV: &str = "APPHEALTH_TEST_FRACTION";
pub const IMPORTANCE_SOURCE_ENV: &str = "APPHEALTH_IMPORTANCE_SOURCE";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `diabetes_data.csv` and `hypertension_data.csv`.
    pub data_dir: PathBuf,
    /// Directory for trained model artifacts and their manifest.
    pub model_dir: PathBuf,
    /// SQLite file for assessment history.
    pub db_path: PathBuf,
    pub forest: ForestParams,
    pub training: TrainingOptions,
    pub importance_source: ImportanceSource,
    pub chart: ChartConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            model_dir: PathBuf::from("models"),
            db_path: PathBuf::from("apphealth.db"),
            forest: ForestParams::default(),
            training: TrainingOptions::default(),
            importance_source: ImportanceSource::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Config {
    /// Load config overrides from the process environment (best-effort).
    ///
    /// Supported:
    /// - APPHEALTH_DATA_DIR, APPHEALTH_MODEL_DIR, APPHEALTH_DB_PATH
    /// - APPHEALTH_FOREST_TREES (> 0), APPHEALTH_FOREST_SEED
    /// - APPHEALTH_SPLIT_SEED, APPHEALTH_TEST_FRACTION (in `[0, 1)`)
    /// - APPHEALTH_IMPORTANCE_SOURCE=reference|model
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env_or_default`] with an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = text(DATA_DIR_ENV) {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = text(MODEL_DIR_ENV) {
            cfg.model_dir = PathBuf::from(v);
        }
        if let Some(v) = text(DB_PATH_ENV) {
            cfg.db_path = PathBuf::from(v);
        }

        if let Some(Ok(n)) = text(FOREST_TREES_ENV).map(|v| v.parse::<usize>()) {
            if n > 0 {
                cfg.forest.n_trees = n;
            }
        }
        if let Some(Ok(seed)) = text(FOREST_SEED_ENV).map(|v| v.parse::<u64>()) {
            cfg.forest.seed = seed;
        }
        if let Some(Ok(seed)) = text(SPLIT_SEED_ENV).map(|v| v.parse::<u64>()) {
            cfg.training.split_seed = seed;
        }
        if let Some(Ok(x)) = text(TEST_FRACTION_ENV).map(|v| v.parse::<f64>()) {
            if (0.0..1.0).contains(&x) {
                cfg.training.test_fraction = x;
            }
        }

        match text(IMPORTANCE_SOURCE_ENV).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("model") => cfg.importance_source = ImportanceSource::Model,
            Some("reference") => cfg.importance_source = ImportanceSource::Reference,
            Some(other) => tracing::warn!(value = %other, "Unknown importance source, keeping default"),
            None => {}
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.model_dir, PathBuf::from("models"));
        assert_eq!(cfg.db_path, PathBuf::from("apphealth.db"));
        assert_eq!(cfg.forest.n_trees, 100);
        assert_eq!(cfg.forest.seed, 42);
        assert_eq!(cfg.training.split_seed, 123);
        assert!((cfg.training.test_fraction - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.importance_source, ImportanceSource::Reference);
        assert_eq!(cfg.chart.bin_count, 13);
    }

    #[test]
    fn test_overrides_applied() {
        let cfg = config_from(&[
            (DATA_DIR_ENV, "/srv/cohorts"),
            (FOREST_TREES_ENV, "25"),
            (FOREST_SEED_ENV, "7"),
            (SPLIT_SEED_ENV, " 9 "),
            (TEST_FRACTION_ENV, "0.2"),
            (IMPORTANCE_SOURCE_ENV, "Model"),
        ]);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/cohorts"));
        assert_eq!(cfg.forest.n_trees, 25);
        assert_eq!(cfg.forest.seed, 7);
        assert_eq!(cfg.training.split_seed, 9);
        assert!((cfg.training.test_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.importance_source, ImportanceSource::Model);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let cfg = config_from(&[
            (FOREST_TREES_ENV, "0"),
            (FOREST_SEED_ENV, "-3"),
            (TEST_FRACTION_ENV, "1.5"),
            (IMPORTANCE_SOURCE_ENV, "shap"),
            (DB_PATH_ENV, "   "),
        ]);
        assert_eq!(cfg, Config::default());
    }
}
