//! Hybrid retrieval entry points — spec.md §4.5 / §4.7.
//!
//! Two distinct search contracts, matching the two candidate streams
//! `searcher.rs` fuses (spec.md §4.7 steps 6-7):
//! - `search_multi_with_text` — hybrid: a BM25 lexical pass and an
//!   approximate-ANN vector pass over the same scope, reranked with exact
//!   MaxSim, fused into one deduplicated hit list.
//! - `query_with_options` — pure semantic MaxSim, no lexical component at
//!   all. Below `EXACT_MAXSIM_THRESHOLD` candidates this is exact
//!   brute-force MaxSim against every in-scope block; above it, the
//!   approximate ANN prefetch (over pooled FDE vectors) is reranked exactly
//!   the same way. This is the stream that catches conceptual queries BM25
//!   can't (spec.md §4.7 step 7, scenario 2: "retry with backoff" finding
//!   `exponential_backoff`).
//!
//! The searcher is responsible for the overfetch multiplier, cross-stream
//! merge, boosting, and final truncation to the caller's requested `-n`;
//! this layer only needs to produce good candidates and a faithful base
//! score for each.

use std::collections::HashMap;

use crate::embedder::MultiVector;
use crate::math::max_sim;

use super::ann::AnnIndex;
use super::helpers::{deserialize_fde, BlockRow, QueryOptions, SearchHit, StoreError};
use super::Store;

/// Below this many in-scope candidates, `query_with_options` computes exact
/// MaxSim against every one rather than going through the approximate ANN
/// prefetch (spec.md §4.5: "below a threshold... exact brute-force MaxSim").
const EXACT_MAXSIM_THRESHOLD: usize = 5_000;

impl Store {
    pub fn search_multi_with_text(
        &self,
        query_text_split: &str,
        query_matrix: &MultiVector,
        query_fde: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let bm25 = self.bm25_candidates(query_text_split, options)?;
        let ann = self.vector_candidates(query_fde, options)?;

        let mut merged: HashMap<String, SearchHit> = HashMap::new();
        for hit in bm25.into_iter().chain(ann.into_iter()) {
            merged
                .entry(hit.block.id.clone())
                .and_modify(|existing| {
                    if hit.score > existing.score {
                        *existing = hit.clone();
                    }
                })
                .or_insert(hit);
        }

        // Exact rerank: every merged candidate's score becomes its true
        // MaxSim against the query, so BM25-only hits and ANN-only hits are
        // comparable on the same scale.
        let mut results = Vec::with_capacity(merged.len());
        for (_, mut hit) in merged {
            if let Some(matrix) = self.fetch_matrix(&hit.block.id)? {
                hit.score = max_sim(query_matrix, &matrix);
            }
            results.push(hit);
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    /// Pure-semantic MaxSim search: no BM25 component (spec.md §4.5's
    /// `query_with_options` contract). Below [`EXACT_MAXSIM_THRESHOLD`]
    /// in-scope blocks this reranks every one exactly; above it, the
    /// approximate ANN prefetch over pooled FDE vectors narrows the
    /// candidate set first, then the same exact MaxSim rerank runs over
    /// just those.
    pub fn query_with_options(
        &self,
        query_matrix: &MultiVector,
        query_fde: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let in_scope = self.count_in_scope(options.scope_prefix.as_deref())?;

        let candidate_ids: Vec<String> = if in_scope <= EXACT_MAXSIM_THRESHOLD {
            self.list_blocks(&QueryOptions {
                limit: 0,
                ..options.clone()
            })?
            .into_iter()
            .map(|hit| hit.block.id)
            .collect()
        } else {
            let ann = self.build_ann_index(options.scope_prefix.as_deref())?;
            ann.search(query_fde, options.limit.max(1).saturating_mul(4))
                .into_iter()
                .map(|(id, _)| id)
                .collect()
        };

        let mut results = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            let Some(block) = self.fetch_block(&id)? else { continue };
            if options.exclude_relative_path.as_deref() == Some(block.relative_path.as_str()) {
                continue;
            }
            if let Some(kind) = options.kind {
                if block.kind != kind {
                    continue;
                }
            }
            if let Some(matrix) = self.fetch_matrix(&id)? {
                let score = max_sim(query_matrix, &matrix);
                results.push(SearchHit { block, score });
            }
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if options.limit > 0 {
            results.truncate(options.limit);
        }
        Ok(results)
    }

    fn count_in_scope(&self, scope_prefix: Option<&str>) -> Result<usize, StoreError> {
        self.rt.block_on(async {
            let (n,): (i64,) = if let Some(prefix) = scope_prefix {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM blocks WHERE deleted = 0
                     AND (relative_path = ?1 OR relative_path LIKE ?1 || '/%')",
                )
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?
            } else {
                sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE deleted = 0")
                    .fetch_one(&self.pool)
                    .await?
            };
            Ok(n as usize)
        })
    }

    /// Filtered, unranked listing — used by the `list`/`status` CLI surface
    /// and as the candidate source for exact-threshold `query_with_options`.
    pub fn list_blocks(&self, options: &QueryOptions) -> Result<Vec<SearchHit>, StoreError> {
        self.rt.block_on(async {
            let mut sql = String::from(
                "SELECT id, relative_path, language, kind, name, start_line, end_line,
                        content, embedding_text, parent_type_name
                 FROM blocks WHERE deleted = 0",
            );
            if options.scope_prefix.is_some() {
                sql.push_str(" AND (relative_path = ?1 OR relative_path LIKE ?1 || '/%')");
            }
            if options.kind.is_some() {
                sql.push_str(" AND kind = ?2");
            }
            if options.exclude_relative_path.is_some() {
                sql.push_str(" AND relative_path != ?3");
            }
            sql.push_str(" ORDER BY relative_path, start_line LIMIT ?4");

            let mut query = sqlx::query_as::<_, (String, String, String, String, String, i64, i64, String, String, Option<String>)>(&sql);
            query = query.bind(options.scope_prefix.clone().unwrap_or_default());
            query = query.bind(options.kind.map(|k| k.as_str().to_string()).unwrap_or_default());
            query = query.bind(options.exclude_relative_path.clone().unwrap_or_default());
            let limit = if options.limit == 0 { i64::MAX } else { options.limit as i64 };
            query = query.bind(limit);

            let rows = query.fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|(id, relative_path, language, kind, name, start_line, end_line, content, embedding_text, parent_type_name)| {
                    let is_prose = matches!(crate::language::REGISTRY.get(&language), None) && language != "unknown";
                    let row = BlockRow {
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
                    row.into_block().map(|block| SearchHit { block, score: 0.0 })
                })
                .collect()
        })
    }

    fn bm25_candidates(&self, query_text_split: &str, options: &QueryOptions) -> Result<Vec<SearchHit>, StoreError> {
        if query_text_split.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.rt.block_on(async {
            let mut sql = String::from(
                "SELECT b.id, b.relative_path, b.language, b.kind, b.name, b.start_line, b.end_line,
                        b.content, b.embedding_text, b.parent_type_name,
                        bm25(blocks_fts) AS rank
                 FROM blocks_fts
                 JOIN blocks b ON b.id = blocks_fts.id
                 WHERE blocks_fts MATCH ?1 AND b.deleted = 0",
            );
            if options.scope_prefix.is_some() {
                sql.push_str(" AND (b.relative_path = ?2 OR b.relative_path LIKE ?2 || '/%')");
            }
            sql.push_str(" ORDER BY rank LIMIT ?3");

            let mut query = sqlx::query_as::<_, (String, String, String, String, String, i64, i64, String, String, Option<String>, f64)>(&sql);
            query = query.bind(query_text_split);
            query = query.bind(options.scope_prefix.clone().unwrap_or_default());
            query = query.bind(options.limit.max(1) as i64);

            let rows = query.fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|(id, relative_path, language, kind, name, start_line, end_line, content, embedding_text, parent_type_name, rank)| {
                    let is_prose = crate::language::REGISTRY.get(&language).is_none();
                    let row = BlockRow {
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
                    // bm25() returns a *cost* (lower is better); invert so higher is better,
                    // matching the vector channel's similarity convention.
                    let score = (-rank) as f32;
                    row.into_block().map(|block| SearchHit { block, score })
                })
                .collect()
        })
    }

    fn vector_candidates(&self, query_fde: &[f32], options: &QueryOptions) -> Result<Vec<SearchHit>, StoreError> {
        let ann = self.build_ann_index(options.scope_prefix.as_deref())?;
        if ann.is_empty() {
            return Ok(Vec::new());
        }
        let neighbors = ann.search(query_fde, options.limit.max(1));
        let mut hits = Vec::with_capacity(neighbors.len());
        for (id, score) in neighbors {
            if let Some(block) = self.fetch_block(&id)? {
                hits.push(SearchHit { block, score });
            }
        }
        Ok(hits)
    }

    fn build_ann_index(&self, scope_prefix: Option<&str>) -> Result<AnnIndex, StoreError> {
        self.rt.block_on(async {
            let rows: Vec<(String, Vec<u8>)> = if let Some(prefix) = scope_prefix {
                sqlx::query_as(
                    "SELECT v.block_id, v.fde FROM vectors v
                     JOIN blocks b ON b.id = v.block_id
                     WHERE b.deleted = 0 AND (b.relative_path = ?1 OR b.relative_path LIKE ?1 || '/%')",
                )
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?
            } else {
                sqlx::query_as(
                    "SELECT v.block_id, v.fde FROM vectors v
                     JOIN blocks b ON b.id = v.block_id
                     WHERE b.deleted = 0",
                )
                .fetch_all(&self.pool)
                .await?
            };
            let vectors = rows.into_iter().map(|(id, bytes)| (id, deserialize_fde(&bytes))).collect();
            Ok(AnnIndex::build(vectors))
        })
    }

    fn fetch_matrix(&self, block_id: &str) -> Result<Option<MultiVector>, StoreError> {
        self.get_tokens(block_id)
    }

    fn fetch_block(&self, block_id: &str) -> Result<Option<crate::block::Block>, StoreError> {
        self.get_block(block_id)
    }
}
