//! Indexer — spec.md §4.6: orchestrates walker → extractor → embedder →
//! store, maintains the manifest, merges subordinate indexes, and deletes
//! blocks for removed files.
//!
//! `build` and `update` share one `reindex` routine: a fresh build starts
//! from an empty (or subordinate-seeded) manifest, so every on-disk file
//! looks "new" and gets extracted; an incremental update starts from the
//! existing manifest, so only changed/new/removed files do. This mirrors
//! the teacher's single `cmd_index` path serving both `cqs init` and
//! `cqs index --force` (`cli.rs`), rather than duplicating the walk/extract/
//! embed/store pipeline per entry point.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use rayon::prelude::*;

use crate::block::Block;
use crate::embedder::EmbedMode;
use crate::error::CoreError;
use crate::extractor::Extractor;
use crate::locator::{self, LocatorError};
use crate::manifest::{FileRecord, Manifest, ModelIdentity};
use crate::progress::{Phase, ProgressSink};
use crate::store::Store;
use crate::walker::{FileMetadata, WalkConfig, Walker};

/// Blocks per embedding batch (spec.md §4.6 step 5: "fixed-size batches").
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub files_removed: usize,
    pub files_skipped: usize,
    pub blocks_indexed: usize,
    pub merged_subordinates: usize,
}

pub struct Indexer {
    target_root: PathBuf,
    walk_config: WalkConfig,
    model_dir: PathBuf,
    model_name: String,
    model_dim: usize,
    max_seq_len: usize,
}

impl Indexer {
    pub fn new(
        target_root: &Path,
        walk_config: WalkConfig,
        model_dir: PathBuf,
        model_name: String,
        model_dim: usize,
        max_seq_len: usize,
    ) -> Result<Self, CoreError> {
        let target_root = dunce::canonicalize(target_root).map_err(|e| {
            CoreError::Walk(crate::walker::WalkError::Canonicalize(target_root.to_path_buf(), e))
        })?;
        Ok(Self {
            target_root,
            walk_config,
            model_dir,
            model_name,
            model_dim,
            max_seq_len,
        })
    }

    pub fn index_dir(&self) -> PathBuf {
        self.target_root.join(crate::INDEX_DIR)
    }

    fn manifest_path(&self) -> PathBuf {
        self.index_dir().join("manifest.json")
    }

    fn store_path(&self) -> PathBuf {
        self.index_dir().join("index.db")
    }

    fn model_identity(&self) -> ModelIdentity {
        ModelIdentity {
            name: self.model_name.clone(),
            dimension: self.model_dim,
        }
    }

    /// Fresh build (spec.md §4.6 "Build (fresh)"): refuses to run under an
    /// existing parent index, merges any subordinate indexes found beneath
    /// the target, then indexes every file under a newly created manifest.
    pub fn build(&self, progress: &dyn ProgressSink) -> Result<IndexSummary, CoreError> {
        locator::ensure_no_parent_index(&self.target_root).map_err(|LocatorError::ParentIndexExists { at }| {
            CoreError::ParentIndexExists { at }
        })?;

        std::fs::create_dir_all(self.index_dir())?;
        let _lock = acquire_lock(&self.index_dir())?;

        let store = Store::open(&self.store_path())?;
        let identity = self.model_identity();
        store.init(&identity)?;
        let mut manifest = Manifest::new(identity, now_unix_ns());

        let subordinates = locator::find_subordinate_indexes(&self.target_root);
        let mut merged_subordinates = 0usize;
        for sub_root in &subordinates {
            if let Err(e) = self.merge_subordinate(sub_root, &store, &mut manifest) {
                tracing::warn!(root = %sub_root.display(), error = %e, "failed to merge subordinate index, skipping");
                continue;
            }
            merged_subordinates += 1;
        }

        let mut summary = self.reindex(&store, &mut manifest, progress)?;
        summary.merged_subordinates = merged_subordinates;

        manifest.save(&self.manifest_path())?;
        store.flush()?;
        tracing::info!(
            root = %self.target_root.display(),
            blocks = summary.blocks_indexed,
            merged = summary.merged_subordinates,
            "build complete"
        );
        Ok(summary)
    }

    /// Incremental update (spec.md §4.6 "Incremental update"): requires an
    /// existing, schema/model-compatible manifest at `target_root`.
    pub fn update(&self, progress: &dyn ProgressSink) -> Result<IndexSummary, CoreError> {
        let _lock = acquire_lock(&self.index_dir())?;

        let manifest_path = self.manifest_path();
        let mut manifest = Manifest::try_load(&manifest_path)?
            .ok_or_else(|| CoreError::IndexMissing(self.target_root.clone()))?;

        let identity = self.model_identity();
        if !manifest.is_compatible_with(&identity) {
            return Err(CoreError::IndexNeedsRebuild(self.target_root.clone()));
        }

        let store = Store::open(&self.store_path())?;
        let summary = self.reindex(&store, &mut manifest, progress)?;
        manifest.save(&manifest_path)?;
        store.flush()?;
        Ok(summary)
    }

    /// Copies a subordinate index's blocks into `store` under paths
    /// re-rooted at `target_root`, without re-embedding: vectors are read
    /// back and their FDE pooled fresh (pooling, not inference), then folds
    /// the subordinate's manifest file records into `manifest`. The
    /// subordinate's own index directory is removed once copied.
    fn merge_subordinate(&self, sub_root: &Path, store: &Store, manifest: &mut Manifest) -> Result<(), CoreError> {
        let sub_index_dir = sub_root.join(crate::INDEX_DIR);
        let sub_manifest = Manifest::load(&sub_index_dir.join("manifest.json"))?;
        let sub_store = Store::open(&sub_index_dir.join("index.db"))?;

        let prefix = sub_root
            .strip_prefix(&self.target_root)
            .unwrap_or(sub_root)
            .to_string_lossy()
            .replace('\\', "/");

        for (old_relative_path, record) in &sub_manifest.files {
            let new_relative_path = if prefix.is_empty() {
                old_relative_path.clone()
            } else {
                format!("{prefix}/{old_relative_path}")
            };

            let mut new_block_ids = Vec::with_capacity(record.block_ids.len());
            for old_id in &record.block_ids {
                let Some(mut block) = sub_store.get_block(old_id)? else { continue };
                let Some(matrix) = sub_store.get_tokens(old_id)? else { continue };

                block.relative_path = new_relative_path.clone();
                block.id = Block::make_id(&block.relative_path, block.start_line, &block.name);
                let fde = crate::math::fixed_dimensional_encoding(&matrix);
                store.store(&block, &matrix, &fde)?;
                new_block_ids.push(block.id);
            }

            manifest.record_file(
                new_relative_path,
                FileRecord {
                    mtime_ns: record.mtime_ns,
                    content_hash: record.content_hash.clone(),
                    block_ids: new_block_ids,
                },
                now_unix_ns(),
            );
        }

        drop(sub_store);
        std::fs::remove_dir_all(&sub_index_dir)?;
        Ok(())
    }

    /// Shared walk→diff→extract→embed→store routine driving both `build`
    /// and `update` (spec.md §4.6 steps 3-6 / incremental steps 1-6).
    fn reindex(&self, store: &Store, manifest: &mut Manifest, progress: &dyn ProgressSink) -> Result<IndexSummary, CoreError> {
        let walker = Walker::new(&self.target_root, self.walk_config.clone())?;
        let metadata = walker.scan_metadata();
        progress.on_progress(Phase::Walking, metadata.len(), metadata.len());

        let on_disk: HashSet<&str> = metadata.iter().map(|m| m.relative_path.as_str()).collect();

        let mut files_removed = 0usize;
        let removed_paths: Vec<String> = manifest
            .files
            .keys()
            .filter(|p| !on_disk.contains(p.as_str()))
            .cloned()
            .collect();
        for path in removed_paths {
            if let Some(record) = manifest.remove_file(&path, now_unix_ns()) {
                for id in &record.block_ids {
                    store.delete(id)?;
                }
                files_removed += 1;
            }
        }

        // Candidates whose mtime differs from the manifest (or are entirely new).
        let mtime_changed: Vec<&FileMetadata> = metadata
            .iter()
            .filter(|m| manifest.files.get(&m.relative_path).map(|r| r.mtime_ns) != Some(m.mtime_ns))
            .collect();

        let mut confirmed: Vec<(FileMetadata, String)> = Vec::new();
        let mut files_skipped = 0usize;
        for meta in mtime_changed {
            let abs = self.target_root.join(&meta.relative_path);
            let bytes = match std::fs::read(&abs) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(path = %abs.display(), error = %e, "skipping unreadable file");
                    files_skipped += 1;
                    continue;
                }
            };
            let content_hash = blake3::hash(&bytes).to_hex().to_string();

            if !manifest.is_stale(&meta.relative_path, meta.mtime_ns, &content_hash) {
                // mtime moved but content didn't — refresh mtime only (spec.md
                // §4.6 incremental step 3: "mtime lied").
                if let Some(record) = manifest.files.get_mut(&meta.relative_path) {
                    record.mtime_ns = meta.mtime_ns;
                }
                continue;
            }
            confirmed.push((meta.clone(), content_hash));
        }

        // Stale blocks from files about to be re-extracted are dropped first
        // so a build failure never leaves duplicate ids behind.
        for (meta, _) in &confirmed {
            if let Some(record) = manifest.files.get(&meta.relative_path) {
                for id in &record.block_ids {
                    store.delete(id)?;
                }
            }
        }

        progress.on_progress(Phase::Extracting, 0, confirmed.len());
        let extractor = Extractor::new();
        let extracted: Vec<(FileMetadata, String, Vec<Block>)> = confirmed
            .par_iter()
            .filter_map(|(meta, content_hash)| {
                let abs = self.target_root.join(&meta.relative_path);
                match extractor.extract_file(&abs, &meta.relative_path) {
                    Ok(blocks) => Some((meta.clone(), content_hash.clone(), blocks)),
                    Err(e) => {
                        tracing::warn!(path = %abs.display(), error = %e, "extraction failed, skipping file");
                        None
                    }
                }
            })
            .collect();
        let files_extraction_failed = confirmed.len() - extracted.len();
        progress.on_progress(Phase::Extracting, extracted.len(), extracted.len());

        // Flatten to (file_index, Block), sorted by embedding_text length
        // ascending to minimize padding waste when batched (spec.md §4.6
        // build step 4).
        let mut flattened: Vec<(usize, Block)> = extracted
            .iter()
            .enumerate()
            .flat_map(|(file_idx, (_, _, blocks))| blocks.iter().cloned().map(move |b| (file_idx, b)))
            .collect();
        flattened.sort_by_key(|(_, b)| b.embedding_text.len());

        let mut file_block_ids: Vec<Vec<String>> = vec![Vec::new(); extracted.len()];
        let mut blocks_indexed = 0usize;

        let embedder_lock = crate::embedder::global(&self.model_dir, &self.model_name, self.model_dim, self.max_seq_len)
            .map_err(|e| CoreError::EmbeddingBatch(e.to_string()))?;

        for chunk in flattened.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = chunk.iter().map(|(_, b)| b.embedding_text.clone()).collect();
            let matrices = {
                let mut embedder = embedder_lock.lock().expect("embedder mutex poisoned");
                embedder
                    .embed_batch(&texts, EmbedMode::Document)
                    .map_err(|e| CoreError::EmbeddingBatch(e.to_string()))?
            };

            let mut batch_items = Vec::with_capacity(chunk.len());
            for ((file_idx, block), matrix) in chunk.iter().zip(matrices.into_iter()) {
                let fde = crate::math::fixed_dimensional_encoding(&matrix);
                file_block_ids[*file_idx].push(block.id.clone());
                batch_items.push((block.clone(), matrix, fde));
            }
            store.store_batch(&batch_items)?;
            blocks_indexed += batch_items.len();
            progress.on_progress(Phase::Embedding, blocks_indexed, flattened.len());
        }

        progress.on_progress(Phase::Storing, blocks_indexed, flattened.len());

        for (file_idx, (meta, content_hash, _)) in extracted.iter().enumerate() {
            manifest.record_file(
                meta.relative_path.clone(),
                FileRecord {
                    mtime_ns: meta.mtime_ns,
                    content_hash: content_hash.clone(),
                    block_ids: std::mem::take(&mut file_block_ids[file_idx]),
                },
                now_unix_ns(),
            );
        }

        Ok(IndexSummary {
            files_indexed: extracted.len(),
            files_removed,
            files_skipped: files_skipped + files_extraction_failed,
            blocks_indexed,
            merged_subordinates: 0,
        })
    }
}

/// Holds an advisory exclusive lock on the index directory for the duration
/// of a write (spec.md §5: "guarded by an advisory file lock for the
/// duration of any write"). Dropping the guard closes the file, releasing
/// the lock.
struct LockGuard(#[allow(dead_code)] File);

fn acquire_lock(index_dir: &Path) -> Result<LockGuard, CoreError> {
    let lock_path = index_dir.join(".lock");
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    FileExt::lock_exclusive(&file).map_err(|_| CoreError::IndexLocked(index_dir.to_path_buf()))?;
    Ok(LockGuard(file))
}

fn now_unix_ns() -> i128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use std::fs;

    fn test_model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/model")
    }

    fn indexer_for(root: &Path) -> Indexer {
        Indexer::new(
            root,
            WalkConfig::default(),
            test_model_dir(),
            "test-model".to_string(),
            2,
            32,
        )
        .unwrap()
    }

    #[test]
    fn build_refuses_under_existing_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join(crate::INDEX_DIR)).unwrap();
        let child = dir.path().join("src");
        fs::create_dir_all(&child).unwrap();

        let indexer = indexer_for(&child);
        let err = indexer.build(&NoopProgress).unwrap_err();
        assert!(matches!(err, CoreError::ParentIndexExists { .. }));
    }

    #[test]
    fn update_without_prior_build_is_index_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let indexer = indexer_for(dir.path());
        let err = indexer.update(&NoopProgress).unwrap_err();
        assert!(matches!(err, CoreError::IndexMissing(_)));
    }
}
