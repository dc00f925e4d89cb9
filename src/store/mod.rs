//! Vector store — spec.md §4.5.
//!
//! SQLite (via sqlx) for blocks, FTS5 BM25 lexical search, and per-block
//! vector payloads; an in-memory `hnsw_rs` graph for approximate ANN
//! prefetch over pooled FDE vectors. Synchronous methods wrap a private
//! tokio `Runtime`, the same sync-over-async shape as the teacher's
//! `store/mod.rs` — callers never see a `Future`.
//!
//! ## Module structure
//! - `helpers` — shared types, error enum, serialization
//! - `blocks` — block CRUD (store/delete/get_tokens/flush/compact/count)
//! - `search` — `search_multi_with_text` / `query_with_options`
//! - `ann` — the in-memory HNSW prefetch index

mod ann;
mod blocks;
pub(crate) mod helpers;
mod search;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

pub use helpers::{QueryOptions, SearchHit, StoreError};

use crate::manifest::ModelIdentity;

const CURRENT_SCHEMA_VERSION: u32 = 1;

pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) rt: Runtime,
    closed: AtomicBool,
}

impl Store {
    /// Opens (creating if absent) a store at `path`, a single SQLite file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let rt = Runtime::new().map_err(|e| StoreError::Runtime(e.to_string()))?;

        let path_str = path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{path_str}?mode=rwc");

        let pool = rt
            .block_on(async {
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .idle_timeout(std::time::Duration::from_secs(300))
                    .after_connect(|conn, _meta| {
                        Box::pin(async move {
                            sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                            sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                            sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                            sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                            Ok(())
                        })
                    })
                    .connect(&db_url)
                    .await
            })
            .map_err(|e| StoreError::Open(path.to_path_buf(), e))?;

        let store = Self {
            pool,
            rt,
            closed: AtomicBool::new(false),
        };
        store.ensure_schema()?;
        tracing::info!(path = %path.display(), "vector store opened");
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let schema = include_str!("schema.sql");
            for statement in schema.split(';') {
                let stmt = statement.trim();
                if stmt.is_empty() || stmt.starts_with("--") {
                    continue;
                }
                sqlx::query(stmt).execute(&self.pool).await?;
            }
            Ok(())
        })
    }

    /// Stamps the store with the model identity it was built for and the
    /// schema version it was created with. Checked against the manifest on
    /// open (spec.md §5: a mismatch forces `IndexNeedsRebuild`).
    pub fn init(&self, model_identity: &ModelIdentity) -> Result<(), StoreError> {
        self.rt.block_on(async {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)")
                .bind(CURRENT_SCHEMA_VERSION.to_string())
                .execute(&self.pool)
                .await?;
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('model_name', ?1)")
                .bind(&model_identity.name)
                .execute(&self.pool)
                .await?;
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('model_dimension', ?1)")
                .bind(model_identity.dimension.to_string())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    /// Closes the WAL cleanly. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.rt.block_on(async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await
        });
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::embedder::MultiVector;
    use crate::language::{BlockKind, Language};
    use ndarray::Array2;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        (dir, store)
    }

    fn matrix(rows: &[[f32; 2]]) -> MultiVector {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        MultiVector {
            dim: 2,
            data: Array2::from_shape_vec((rows.len(), 2), flat).unwrap(),
        }
    }

    #[test]
    fn store_and_count_round_trip() {
        let (_dir, store) = test_store();
        let block = Block::new(
            "src/lib.rs".into(),
            Language::Code("rust"),
            BlockKind::Function,
            "add".into(),
            1,
            3,
            "fn add(a: i32, b: i32) -> i32 { a + b }".into(),
            None,
        );
        let m = matrix(&[[1.0, 0.0], [0.0, 1.0]]);
        store.store(&block, &m, &[0.7, 0.7]).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let tokens = store.get_tokens(&block.id).unwrap().unwrap();
        assert_eq!(tokens.num_tokens(), 2);
    }

    #[test]
    fn delete_then_compact_removes_row() {
        let (_dir, store) = test_store();
        let block = Block::new(
            "a.rs".into(),
            Language::Code("rust"),
            BlockKind::Function,
            "f".into(),
            1,
            1,
            "fn f() {}".into(),
            None,
        );
        store.store(&block, &matrix(&[[1.0, 0.0]]), &[1.0, 0.0]).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.delete(&block.id).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.deleted_count().unwrap(), 1);

        store.compact().unwrap();
        assert_eq!(store.deleted_count().unwrap(), 0);
    }

    #[test]
    fn bm25_search_finds_matching_name() {
        let (_dir, store) = test_store();
        let block = Block::new(
            "auth.py".into(),
            Language::Code("python"),
            BlockKind::Function,
            "authenticate_user".into(),
            1,
            5,
            "def authenticate_user(): pass".into(),
            None,
        );
        store.store(&block, &matrix(&[[1.0, 0.0]]), &[1.0, 0.0]).unwrap();

        let query_matrix = matrix(&[[1.0, 0.0]]);
        let options = QueryOptions {
            limit: 10,
            ..Default::default()
        };
        let hits = store
            .search_multi_with_text("authenticate user", &query_matrix, &[1.0, 0.0], &options)
            .unwrap();
        assert!(hits.iter().any(|h| h.block.id == block.id));
    }
}
