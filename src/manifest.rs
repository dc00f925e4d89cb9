//! Index manifest — spec.md §5.
//!
//! Tracks, per indexed file, the state needed to decide whether it's stale
//! (`mtime_ns` + `content_hash`) and which blocks it produced, plus the
//! `schema_version`/`model_identity` pair that gates incremental update vs.
//! hard rebuild. Grounded on the teacher's `metadata` table
//! (`store/mod.rs::check_schema_version`/`check_model_version`), but kept as
//! a single JSON sidecar file rather than SQLite rows — the vector store
//! already owns a database; the manifest needs to be readable without one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump whenever the manifest's on-disk shape changes incompatibly.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest at {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to write manifest at {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("failed to parse manifest at {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

/// Per-file bookkeeping needed to detect staleness without re-extracting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub mtime_ns: i128,
    pub content_hash: String,
    pub block_ids: Vec<String>,
}

/// Identifies the embedding model a manifest's vectors were produced with.
/// A mismatch against the currently configured model forces
/// [`crate::error::CoreError::IndexNeedsRebuild`] — spec.md §5 is explicit
/// that there is no migration path between model identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub name: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub model_identity: ModelIdentity,
    pub files: HashMap<String, FileRecord>,
    pub created_at_unix_ns: i128,
    pub updated_at_unix_ns: i128,
}

impl Manifest {
    pub fn new(model_identity: ModelIdentity, now_unix_ns: i128) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            model_identity,
            files: HashMap::new(),
            created_at_unix_ns: now_unix_ns,
            updated_at_unix_ns: now_unix_ns,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read(path.to_path_buf(), e))?;
        serde_json::from_str(&content).map_err(|e| ManifestError::Parse(path.to_path_buf(), e))
    }

    pub fn try_load(path: &Path) -> Result<Option<Self>, ManifestError> {
        match std::fs::metadata(path) {
            Ok(_) => Self::load(path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ManifestError::Read(path.to_path_buf(), e)),
        }
    }

    /// Write atomically: serialize to a sibling temp file, then rename over
    /// the target. Rename is atomic on the same filesystem, so a crash
    /// mid-write never leaves a half-written manifest behind.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self).expect("Manifest serialization is infallible");
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| ManifestError::Write(tmp_path.clone(), e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| ManifestError::Write(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Whether this manifest's schema/model match what the current process
    /// would produce. A mismatch means the index can only be rebuilt, never
    /// incrementally updated (spec.md §5).
    pub fn is_compatible_with(&self, model_identity: &ModelIdentity) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION && &self.model_identity == model_identity
    }

    /// True when `relative_path`'s on-disk mtime/content no longer match the
    /// recorded record — the file needs re-extraction.
    pub fn is_stale(&self, relative_path: &str, mtime_ns: i128, content_hash: &str) -> bool {
        match self.files.get(relative_path) {
            Some(record) => record.mtime_ns != mtime_ns || record.content_hash != content_hash,
            None => true,
        }
    }

    pub fn record_file(&mut self, relative_path: String, record: FileRecord, now_unix_ns: i128) {
        self.files.insert(relative_path, record);
        self.updated_at_unix_ns = now_unix_ns;
    }

    pub fn remove_file(&mut self, relative_path: &str, now_unix_ns: i128) -> Option<FileRecord> {
        let removed = self.files.remove(relative_path);
        if removed.is_some() {
            self.updated_at_unix_ns = now_unix_ns;
        }
        removed
    }

    /// All block ids this manifest currently accounts for, across every file.
    pub fn all_block_ids(&self) -> Vec<String> {
        self.files.values().flat_map(|r| r.block_ids.iter().cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ModelIdentity {
        ModelIdentity {
            name: "test-model".into(),
            dimension: 128,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::new(identity(), 1_000);
        manifest.record_file(
            "src/lib.rs".into(),
            FileRecord {
                mtime_ns: 42,
                content_hash: "abc".into(),
                block_ids: vec!["src/lib.rs:1:foo".into()],
            },
            1_001,
        );
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.model_identity, identity());
    }

    #[test]
    fn try_load_missing_returns_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Manifest::try_load(&dir.path().join("nope.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn detects_staleness_by_mtime_and_hash() {
        let mut manifest = Manifest::new(identity(), 0);
        manifest.record_file(
            "a.rs".into(),
            FileRecord {
                mtime_ns: 100,
                content_hash: "h1".into(),
                block_ids: vec![],
            },
            0,
        );
        assert!(!manifest.is_stale("a.rs", 100, "h1"));
        assert!(manifest.is_stale("a.rs", 200, "h1"));
        assert!(manifest.is_stale("a.rs", 100, "h2"));
        assert!(manifest.is_stale("never-seen.rs", 0, "x"));
    }

    #[test]
    fn model_mismatch_is_incompatible() {
        let manifest = Manifest::new(identity(), 0);
        let other = ModelIdentity {
            name: "different-model".into(),
            dimension: 128,
        };
        assert!(manifest.is_compatible_with(&identity()));
        assert!(!manifest.is_compatible_with(&other));
    }

    #[test]
    fn schema_version_mismatch_is_incompatible() {
        let mut manifest = Manifest::new(identity(), 0);
        manifest.schema_version = CURRENT_SCHEMA_VERSION + 1;
        assert!(!manifest.is_compatible_with(&identity()));
    }
}
