//! Top-level error taxonomy — spec.md §7.
//!
//! Module-local error enums (`WalkError`, `ManifestError`, `StoreError`, ...)
//! live next to their module, matching the teacher's split (`ParserError` in
//! `parser/types.rs`, `StoreError` in `store/helpers.rs`). This module holds
//! the taxonomy that's shared across module boundaries — the ones the CLI
//! maps directly to exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced across the build/search/status/clean/list CLI surface.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("not a directory: {0}")]
    PathNotADirectory(PathBuf),
    #[error("no index found at or above {0}; run `build` first")]
    IndexMissing(PathBuf),
    #[error("index at {0} needs a rebuild (schema or model mismatch); run `build --force`")]
    IndexNeedsRebuild(PathBuf),
    #[error("index at {0} is locked by another process")]
    IndexLocked(PathBuf),
    #[error("a governing index already exists at {at}")]
    ParentIndexExists { at: PathBuf },
    #[error("extraction failed for {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: crate::extractor::ExtractError,
    },
    #[error("embedding batch failed: {0}")]
    EmbeddingBatch(String),
    #[error("store write failed: {0}")]
    StoreWrite(#[from] crate::store::StoreError),
    #[error("manifest error: {0}")]
    Manifest(#[from] crate::manifest::ManifestError),
    #[error("walk error: {0}")]
    Walk(#[from] crate::walker::WalkError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Maps this error to the process exit code from spec.md §6.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
