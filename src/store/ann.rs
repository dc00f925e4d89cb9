//! In-memory approximate nearest-neighbor prefetch over pooled FDE vectors.
//!
//! Grounded on the teacher's `hnsw/` module (same tuning constants, same
//! `hnsw_rs` + `DistCosine` pairing), simplified to rebuild from the store's
//! `vectors` table on open rather than persisting the graph itself to disk —
//! this crate only needs the graph for approximate prefetch, so the SQLite
//! rows remain the single source of truth and the graph is disposable.

use hnsw_rs::dist::DistCosine;
use hnsw_rs::hnsw::Hnsw;

const MAX_NB_CONNECTION: usize = 24;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 100;

pub struct AnnIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    id_map: Vec<String>,
}

impl AnnIndex {
    /// Build an index over every `(block_id, fde_vector)` pair currently in
    /// the store.
    pub fn build(vectors: Vec<(String, Vec<f32>)>) -> Self {
        let nb_elem = vectors.len().max(1);
        let mut hnsw = Hnsw::new(MAX_NB_CONNECTION, nb_elem, MAX_LAYER, EF_CONSTRUCTION, DistCosine {});

        let mut id_map = Vec::with_capacity(vectors.len());
        let data_for_insert: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .enumerate()
            .map(|(idx, (id, v))| {
                id_map.push(id.clone());
                (v, idx)
            })
            .collect();
        if !data_for_insert.is_empty() {
            hnsw.parallel_insert(&data_for_insert);
        }

        Self { hnsw, id_map }
    }

    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    /// Returns up to `k` `(block_id, cosine_similarity)` pairs, most similar first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if self.id_map.is_empty() || k == 0 {
            return Vec::new();
        }
        let ef_search = EF_SEARCH.max(k * 2).min(self.id_map.len().max(EF_SEARCH));
        self.hnsw
            .search(query, k, ef_search)
            .into_iter()
            .filter_map(|neighbor| {
                let id = self.id_map.get(neighbor.d_id)?;
                let score = 1.0 - neighbor.distance;
                score.is_finite().then(|| (id.clone(), score))
            })
            .collect()
    }
}
