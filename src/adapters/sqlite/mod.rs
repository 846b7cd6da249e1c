//! SQLite adapter: Implementation of Storage.
//!
//! Provides local persistence for assessment history. Only probabilities,
//! bands and timestamps are stored.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex (from a panic
//! in another thread) causes a panic here as well.
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, Row};

use crate::domain::{Condition, ConditionRisk, RiskAssessment, RiskBand};
use crate::ports::Storage;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                diabetes_probability REAL NOT NULL,
                diabetes_band TEXT NOT NULL,
                hypertension_probability REAL NOT NULL,
                hypertension_band TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_assessments_created
                ON assessments(created_at DESC);
            ",
        )?;

        Ok(())
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<(String, f64, String, f64, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn band(id: &str, raw: &str) -> Result<RiskBand, StorageError> {
        RiskBand::parse(raw).ok_or_else(|| StorageError::Corrupt {
            id: id.to_string(),
            reason: format!("unknown band {raw:?}"),
        })
    }
}

impl Storage for SqliteStorage {
    type Error = StorageError;

    fn save_assessment(&self, assessment: &RiskAssessment) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute(
            r"
            INSERT INTO assessments (
                id, diabetes_probability, diabetes_band,
                hypertension_probability, hypertension_band, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                assessment.id,
                assessment.diabetes.probability,
                assessment.diabetes.band.as_str(),
                assessment.hypertension.probability,
                assessment.hypertension.band.as_str(),
                assessment.created_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!("Saved assessment {} to storage", assessment.id);
        Ok(())
    }

    fn load_recent_assessments(&self, limit: usize) -> Result<Vec<RiskAssessment>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(
            r"
            SELECT id, diabetes_probability, diabetes_band,
                   hypertension_probability, hypertension_band, created_at
            FROM assessments
            ORDER BY created_at DESC
            LIMIT ?1
            ",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, d_prob, d_band, h_prob, h_band, created_at)| {
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .map_err(|e| StorageError::Corrupt {
                        id: id.clone(),
                        reason: e.to_string(),
                    })?;

                Ok(RiskAssessment {
                    diabetes: ConditionRisk {
                        condition: Condition::Diabetes,
                        probability: d_prob,
                        band: Self::band(&id, &d_band)?,
                    },
                    hypertension: ConditionRisk {
                        condition: Condition::Hypertension,
                        probability: h_prob,
                        band: Self::band(&id, &h_band)?,
                    },
                    id,
                    created_at,
                })
            })
            .collect()
    }

    fn count_assessments(&self) -> Result<usize, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))?;

        Ok(count as usize)
    }

    fn delete_assessment(&self, id: &str) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute("DELETE FROM assessments WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear_all(&self) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute_batch("DELETE FROM assessments;")?;
        tracing::warn!("Cleared assessment history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_RISK_THRESHOLD;

    fn assessment(diabetes: f64, hypertension: f64) -> RiskAssessment {
        RiskAssessment::new(
            ConditionRisk::new(Condition::Diabetes, diabetes, DEFAULT_RISK_THRESHOLD),
            ConditionRisk::new(Condition::Hypertension, hypertension, DEFAULT_RISK_THRESHOLD),
        )
    }

    #[test]
    fn test_assessment_crud() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        assert_eq!(storage.count_assessments().expect("Should count"), 0);

        let saved = assessment(0.72, 0.31);
        storage.save_assessment(&saved).expect("Should save");
        assert_eq!(storage.count_assessments().expect("Should count"), 1);

        let loaded = storage.load_recent_assessments(10).expect("Should load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, saved.id);
        assert_eq!(loaded[0].diabetes.band, RiskBand::High);
        assert_eq!(loaded[0].hypertension.probability, 0.31);

        storage.delete_assessment(&saved.id).expect("Should delete");
        assert_eq!(storage.count_assessments().expect("Should count"), 0);
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let storage = SqliteStorage::in_memory().expect("Should create db");

        let mut older = assessment(0.1, 0.1);
        older.created_at = older.created_at - chrono::Duration::minutes(5);
        let newer = assessment(0.9, 0.9);

        storage.save_assessment(&older).expect("Should save");
        storage.save_assessment(&newer).expect("Should save");

        let loaded = storage.load_recent_assessments(1).expect("Should load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, newer.id);
    }

    #[test]
    fn test_clear_all() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        storage.save_assessment(&assessment(0.4, 0.6)).expect("Should save");
        storage.save_assessment(&assessment(0.2, 0.8)).expect("Should save");

        storage.clear_all().expect("Should clear");
        assert_eq!(storage.count_assessments().expect("Should count"), 0);
    }
}
