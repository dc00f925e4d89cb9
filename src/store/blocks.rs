//! Block CRUD — insert/update/delete against `blocks`, `blocks_fts`, and
//! `vectors`. FTS5 doesn't support `INSERT OR REPLACE`, so every upsert is a
//! DELETE-then-INSERT pair within one transaction, matching the teacher's
//! `store/chunks.rs` pattern.

use crate::block::Block;
use crate::embedder::MultiVector;

use super::helpers::{deserialize_matrix, serialize_fde, serialize_matrix, BlockRow, StoreError};
use super::Store;

impl Store {
    /// Fetches one block's full record by id, `None` if absent or soft-deleted.
    /// Used by `search`'s candidate fetch and by subordinate-index merging
    /// (spec.md §4.6 build step 2: "a fast bulk copy by id").
    pub fn get_block(&self, block_id: &str) -> Result<Option<Block>, StoreError> {
        self.rt.block_on(async {
            let row: Option<(String, String, String, String, String, i64, i64, String, String, Option<String>)> = sqlx::query_as(
                "SELECT id, relative_path, language, kind, name, start_line, end_line, content, embedding_text, parent_type_name
                 FROM blocks WHERE id = ?1 AND deleted = 0",
            )
            .bind(block_id)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some((id, relative_path, language, kind, name, start_line, end_line, content, embedding_text, parent_type_name)) => {
                    let is_prose = crate::language::REGISTRY.get(&language).is_none();
                    let block_row = BlockRow {
                        id,
                        relative_path,
                        language,
                        is_prose,
                        kind,
                        name,
                        start_line,
                        end_line,
                        content,
                        embedding_text,
                        parent_type_name,
                    };
                    Ok(Some(block_row.into_block()?))
                }
                None => Ok(None),
            }
        })
    }

    /// Insert or replace a block and its vectors in one transaction.
    pub fn store(&self, block: &Block, matrix: &MultiVector, fde: &[f32]) -> Result<(), StoreError> {
        self.store_batch(&[(block.clone(), matrix.clone(), fde.to_vec())])
    }

    pub fn store_batch(&self, items: &[(Block, MultiVector, Vec<f32>)]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (block, matrix, fde) in items {
                let row = BlockRow::from_block(block);
                sqlx::query("DELETE FROM blocks_fts WHERE id = ?1")
                    .bind(&row.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT INTO blocks
                       (id, relative_path, language, kind, name, start_line, end_line,
                        content, embedding_text, parent_type_name, deleted)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
                     ON CONFLICT(id) DO UPDATE SET
                       relative_path = excluded.relative_path,
                       language = excluded.language,
                       kind = excluded.kind,
                       name = excluded.name,
                       start_line = excluded.start_line,
                       end_line = excluded.end_line,
                       content = excluded.content,
                       embedding_text = excluded.embedding_text,
                       parent_type_name = excluded.parent_type_name,
                       deleted = 0",
                )
                .bind(&row.id)
                .bind(&row.relative_path)
                .bind(&row.language)
                .bind(&row.kind)
                .bind(&row.name)
                .bind(row.start_line)
                .bind(row.end_line)
                .bind(&row.content)
                .bind(&row.embedding_text)
                .bind(&row.parent_type_name)
                .execute(&mut *tx)
                .await?;

                sqlx::query("INSERT INTO blocks_fts (id, name, embedding_text) VALUES (?1, ?2, ?3)")
                    .bind(&row.id)
                    .bind(&row.name)
                    .bind(&row.embedding_text)
                    .execute(&mut *tx)
                    .await?;

                let matrix_bytes = serialize_matrix(matrix);
                let fde_bytes = serialize_fde(fde);
                sqlx::query(
                    "INSERT INTO vectors (block_id, dim, num_tokens, matrix, fde)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(block_id) DO UPDATE SET
                       dim = excluded.dim, num_tokens = excluded.num_tokens,
                       matrix = excluded.matrix, fde = excluded.fde",
                )
                .bind(&row.id)
                .bind(matrix.dim as i64)
                .bind(matrix.num_tokens() as i64)
                .bind(matrix_bytes)
                .bind(fde_bytes)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    /// Soft-deletes a block: flipped out of search results immediately,
    /// physically removed on the next [`Store::compact`] (spec.md §4.5:
    /// `deleted_count`/`compact`).
    pub fn delete(&self, block_id: &str) -> Result<(), StoreError> {
        self.rt.block_on(async {
            sqlx::query("UPDATE blocks SET deleted = 1 WHERE id = ?1")
                .bind(block_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    pub fn delete_by_path(&self, relative_path: &str) -> Result<u64, StoreError> {
        self.rt.block_on(async {
            let result = sqlx::query("UPDATE blocks SET deleted = 1 WHERE relative_path = ?1 AND deleted = 0")
                .bind(relative_path)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
    }

    /// Fetches the stored per-token embedding matrix for one block, if present.
    pub fn get_tokens(&self, block_id: &str) -> Result<Option<MultiVector>, StoreError> {
        self.rt.block_on(async {
            let row: Option<(i64, i64, Vec<u8>)> =
                sqlx::query_as("SELECT dim, num_tokens, matrix FROM vectors WHERE block_id = ?1")
                    .bind(block_id)
                    .fetch_optional(&self.pool)
                    .await?;
            match row {
                Some((dim, num_tokens, bytes)) => Ok(deserialize_matrix(&bytes, num_tokens as usize, dim as usize)),
                None => Ok(None),
            }
        })
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.rt.block_on(async {
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE deleted = 0")
                .fetch_one(&self.pool)
                .await?;
            Ok(n as u64)
        })
    }

    pub fn deleted_count(&self) -> Result<u64, StoreError> {
        self.rt.block_on(async {
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE deleted = 1")
                .fetch_one(&self.pool)
                .await?;
            Ok(n as u64)
        })
    }

    /// Flushes the WAL back into the main database file. Call after a batch
    /// of writes to bound WAL growth (spec.md §4.5: `flush`).
    pub fn flush(&self) -> Result<(), StoreError> {
        self.rt.block_on(async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await?;
            Ok(())
        })
    }

    /// Physically removes soft-deleted rows and reclaims space (spec.md
    /// §4.5: `compact`).
    pub fn compact(&self) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM blocks WHERE deleted = 1")
                .fetch_all(&mut *tx)
                .await?;
            for (id,) in &ids {
                sqlx::query("DELETE FROM blocks_fts WHERE id = ?1").bind(id).execute(&mut *tx).await?;
            }
            sqlx::query("DELETE FROM blocks WHERE deleted = 1").execute(&mut *tx).await?;
            tx.commit().await?;
            sqlx::query("VACUUM").execute(&self.pool).await?;
            Ok(())
        })
    }
}
