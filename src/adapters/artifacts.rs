//! Model artifact store.
//!
//! Trained models are written as JSON, one file per condition, next to a
//! `manifest.json` holding the SHA-256 of every artifact. Loading recomputes
//! the digest and refuses files that do not match the manifest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Condition;

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;

/// Errors raised while reading or writing model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Manifest missing in {0}")]
    MissingManifest(String),

    #[error("Unsupported manifest version {0}")]
    UnsupportedVersion(u32),

    #[error("Artifact {0} is not listed in the manifest")]
    NotInManifest(String),

    #[error("Artifact {file} hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ArtifactManifest {
    version: u32,
    #[serde(default)]
    updated_at: Option<String>,
    files: BTreeMap<String, String>,
}

impl Default for ArtifactManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            updated_at: None,
            files: BTreeMap::new(),
        }
    }
}

fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Directory-backed store of JSON model artifacts.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    dir: PathBuf,
}

impl JsonModelStore {
    #[must_use]
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact file name for `condition`.
    #[must_use]
    pub fn file_name(condition: Condition) -> String {
        format!("{}_model.json", condition.slug())
    }

    /// Whether an artifact for `condition` is present on disk.
    #[must_use]
    pub fn exists(&self, condition: Condition) -> bool {
        self.dir.join(Self::file_name(condition)).is_file()
    }

    fn read_manifest(&self) -> Result<Option<ArtifactManifest>, ArtifactError> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let manifest: ArtifactManifest = serde_json::from_slice(&fs::read(path)?)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::UnsupportedVersion(manifest.version));
        }
        Ok(Some(manifest))
    }

    /// Write the artifact and record its fingerprint in the manifest.
    ///
    /// Returns the SHA-256 hex digest of the written bytes.
    ///
    /// # Errors
    /// Returns error on I/O or serialization failure.
    pub fn save<M: Serialize>(&self, condition: Condition, model: &M) -> Result<String, ArtifactError> {
        fs::create_dir_all(&self.dir)?;

        let file = Self::file_name(condition);
        let bytes = serde_json::to_vec(model)?;
        let digest = sha256_hex_bytes(&bytes);
        fs::write(self.dir.join(&file), &bytes)?;

        let mut manifest = self.read_manifest()?.unwrap_or_default();
        manifest.files.insert(file.clone(), digest.clone());
        manifest.updated_at = Some(chrono::Utc::now().to_rfc3339());
        fs::write(
            self.dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )?;

        tracing::info!(%condition, file = %file, sha256 = %digest, "Saved model artifact");
        Ok(digest)
    }

    /// Load and verify the artifact for `condition`.
    ///
    /// Returns `Ok(None)` when no artifact file exists.
    ///
    /// # Errors
    /// Returns error if the manifest is missing, does not list the file, or
    /// its digest differs from the file on disk.
    pub fn load<M: DeserializeOwned>(&self, condition: Condition) -> Result<Option<M>, ArtifactError> {
        let file = Self::file_name(condition);
        let path = self.dir.join(&file);
        if !path.is_file() {
            return Ok(None);
        }

        let manifest = self
            .read_manifest()?
            .ok_or_else(|| ArtifactError::MissingManifest(self.dir.display().to_string()))?;
        let expected = manifest
            .files
            .get(&file)
            .ok_or_else(|| ArtifactError::NotInManifest(file.clone()))?;

        let bytes = fs::read(&path)?;
        let actual = sha256_hex_bytes(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ArtifactError::HashMismatch {
                file,
                expected: expected.clone(),
                actual,
            });
        }

        let model = serde_json::from_slice(&bytes)?;
        tracing::info!(%condition, file = %file, "Verified model artifact");
        Ok(Some(model))
    }
}
