//! Query orchestration — spec.md §4.7.
//!
//! Sits above the store: decides the overfetch width, asks the store for
//! hybrid candidates, applies boosting, filters by scope, and truncates to
//! the caller's requested result count. `find_similar` reuses the same
//! pipeline seeded from an existing block's own vectors instead of a typed
//! query.

use crate::block::Block;
use crate::boost;
use crate::embedder::{EmbedMode, Embedder};
use crate::error::CoreError;
use crate::store::{QueryOptions, SearchHit, Store};
use crate::tokenizer::rejoin_split;

/// Overfetch multiplier when the query is scoped to a subdirectory — a
/// narrower scope needs more raw candidates per final slot kept, since
/// fewer of the index's blocks are even eligible (spec.md §4.7).
pub const OVERFETCH_SCOPED: usize = 5;
/// Overfetch multiplier for an unscoped (whole-index) query.
pub const OVERFETCH_UNSCOPED: usize = 1;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub scope_prefix: Option<String>,
    pub kind: Option<crate::language::BlockKind>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub block: Block,
    pub score: f32,
}

pub struct Searcher<'a> {
    store: &'a Store,
}

impl<'a> Searcher<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn search(&self, request: &SearchRequest, embedder: &mut Embedder) -> Result<Vec<SearchResult>, CoreError> {
        let overfetch = if request.scope_prefix.is_some() {
            OVERFETCH_SCOPED
        } else {
            OVERFETCH_UNSCOPED
        };
        let candidate_limit = request.limit.saturating_mul(overfetch).max(request.limit);

        let query_matrix = embedder
            .embed_one(&request.query, EmbedMode::Query)
            .map_err(|e| CoreError::EmbeddingBatch(e.to_string()))?;
        let query_fde = crate::math::fixed_dimensional_encoding(&query_matrix);
        let query_text_split = rejoin_split(&request.query);

        let options = QueryOptions {
            scope_prefix: request.scope_prefix.clone(),
            kind: request.kind,
            limit: candidate_limit,
            exclude_relative_path: None,
        };

        // C1: hybrid BM25 + ANN candidates (spec.md §4.7 step 6).
        let hybrid = self
            .store
            .search_multi_with_text(&query_text_split, &query_matrix, &query_fde, &options)?;
        // C2: pure-semantic MaxSim candidates, catching conceptual queries
        // BM25 recall misses (spec.md §4.7 step 7).
        let semantic = self.store.query_with_options(&query_matrix, &query_fde, &options)?;

        let merged = merge_candidate_streams(hybrid, semantic);
        Ok(self.rank(merged, &request.query, request.limit))
    }

    /// Find blocks similar to an existing one, excluding matches from its
    /// own file (spec.md §4.7: "find_similar" variant).
    pub fn find_similar(&self, block: &Block, limit: usize) -> Result<Vec<SearchResult>, CoreError> {
        let query_matrix = self
            .store
            .get_tokens(&block.id)?
            .ok_or_else(|| CoreError::StoreWrite(crate::store::StoreError::BlockNotFound(block.id.clone())))?;
        let query_fde = crate::math::fixed_dimensional_encoding(&query_matrix);

        let options = QueryOptions {
            scope_prefix: None,
            kind: None,
            limit: limit.saturating_mul(OVERFETCH_SCOPED).max(limit),
            exclude_relative_path: Some(block.relative_path.clone()),
        };

        let hybrid = self
            .store
            .search_multi_with_text(&block.embedding_text, &query_matrix, &query_fde, &options)?;
        let semantic = self.store.query_with_options(&query_matrix, &query_fde, &options)?;
        let merged = merge_candidate_streams(hybrid, semantic);

        // `options.exclude_relative_path` already drops same-file rows from
        // the semantic stream's own query; the hybrid stream's SQL layer
        // doesn't see that filter, so re-apply it defensively here.
        let filtered: Vec<SearchHit> = merged
            .into_iter()
            .filter(|h| h.block.relative_path != block.relative_path)
            .collect();

        Ok(self.rank(filtered, &block.name, limit))
    }

    fn rank(&self, hits: Vec<SearchHit>, boost_query: &str, limit: usize) -> Vec<SearchResult> {
        let mut scored: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| {
                let multiplier = boost::compute(boost_query, &hit.block);
                SearchResult {
                    score: hit.score * multiplier,
                    block: hit.block,
                }
            })
            .collect();

        // Stable sort: ties keep their store-order (path, then start_line),
        // matching spec.md §4.7's determinism requirement.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// Fuses the two candidate streams (spec.md §4.7 step 8): for each block id
/// present in either stream, keep the higher of its two scores, along with
/// the metadata attached to whichever hit carried that score.
fn merge_candidate_streams(c1: Vec<SearchHit>, c2: Vec<SearchHit>) -> Vec<SearchHit> {
    use std::collections::HashMap;
    let mut merged: HashMap<String, SearchHit> = HashMap::new();
    for hit in c1.into_iter().chain(c2.into_iter()) {
        merged
            .entry(hit.block.id.clone())
            .and_modify(|existing| {
                if hit.score > existing.score {
                    *existing = hit.clone();
                }
            })
            .or_insert(hit);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{BlockKind, Language};

    fn hit(name: &str, path: &str, score: f32) -> SearchHit {
        SearchHit {
            block: Block::new(path.into(), Language::Code("rust"), BlockKind::Function, name.into(), 1, 2, "fn x(){}".into(), None),
            score,
        }
    }

    #[test]
    fn rank_sorts_descending_and_truncates() {
        let store_dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&store_dir.path().join("i.db")).unwrap();
        let searcher = Searcher::new(&store);

        let hits = vec![hit("a", "a.rs", 0.1), hit("b", "b.rs", 0.9), hit("c", "c.rs", 0.5)];
        let results = searcher.rank(hits, "unrelated", 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].block.name, "b");
    }

    #[test]
    fn overfetch_is_wider_when_scoped() {
        assert!(OVERFETCH_SCOPED > OVERFETCH_UNSCOPED);
    }

    #[test]
    fn merge_keeps_max_score_per_id() {
        let c1 = vec![hit("a", "a.rs", 0.2), hit("b", "b.rs", 0.9)];
        let c2 = vec![hit("a", "a.rs", 0.7), hit("c", "c.rs", 0.4)];
        let merged = merge_candidate_streams(c1, c2);
        assert_eq!(merged.len(), 3);
        let a = merged.iter().find(|h| h.block.name == "a").unwrap();
        assert!((a.score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn merge_includes_ids_unique_to_either_stream() {
        let c1 = vec![hit("only_in_c1", "x.rs", 0.3)];
        let c2 = vec![hit("only_in_c2", "y.rs", 0.6)];
        let merged = merge_candidate_streams(c1, c2);
        let names: Vec<_> = merged.iter().map(|h| h.block.name.clone()).collect();
        assert!(names.contains(&"only_in_c1".to_string()));
        assert!(names.contains(&"only_in_c2".to_string()));
    }
}
