//! Vector scoring utilities — spec.md §4.5.
//!
//! Grounded on the teacher's `math.rs` (`cosine_similarity` via simsimd with
//! a scalar fallback), extended here with MaxSim late-interaction scoring
//! over the multi-vector matrices the embedder now produces.

use crate::embedder::MultiVector;

/// Dot product of two equal-length, L2-normalized vectors (cosine similarity
/// for normalized inputs). Uses SIMD acceleration when available.
pub fn dot(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    use simsimd::SpatialSimilarity;
    let score = f32::dot(a, b).unwrap_or_else(|| {
        a.iter().zip(b).map(|(&x, &y)| (x as f64) * (y as f64)).sum::<f64>() as f32
    });
    if score.is_finite() {
        Some(score)
    } else {
        None
    }
}

/// MaxSim late-interaction score between a query's and a document's
/// multi-vector matrices (spec.md §4.5): for every query token, take its
/// maximum similarity against any document token, then sum across query
/// tokens.
pub fn max_sim(query: &MultiVector, document: &MultiVector) -> f32 {
    if query.num_tokens() == 0 || document.num_tokens() == 0 {
        return 0.0;
    }
    let mut total = 0.0f32;
    for qi in 0..query.num_tokens() {
        let q_row = query.row(qi);
        let mut best = f32::NEG_INFINITY;
        for di in 0..document.num_tokens() {
            if let Some(score) = dot(q_row, document.row(di)) {
                if score > best {
                    best = score;
                }
            }
        }
        if best.is_finite() {
            total += best;
        }
    }
    total
}

/// Pools a multi-vector matrix into one fixed-dimensional vector by
/// mean-pooling across tokens, then L2-normalizing — the FDE used to drive
/// approximate ANN prefetch (spec.md §4.5 / §6 glossary: "Fixed-Dimensional
/// Encoding").
pub fn fixed_dimensional_encoding(matrix: &MultiVector) -> Vec<f32> {
    let dim = matrix.dim;
    if matrix.num_tokens() == 0 {
        return vec![0.0; dim];
    }
    let mut pooled = vec![0.0f32; dim];
    for i in 0..matrix.num_tokens() {
        let row = matrix.row(i);
        for d in 0..dim {
            pooled[d] += row[d];
        }
    }
    let n = matrix.num_tokens() as f32;
    for v in pooled.iter_mut() {
        *v /= n;
    }
    let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in pooled.iter_mut() {
            *v /= norm;
        }
    }
    pooled
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn mv(rows: Vec<Vec<f32>>) -> MultiVector {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let n = flat.len() / dim.max(1);
        MultiVector {
            dim,
            data: Array2::from_shape_vec((n, dim), flat).unwrap(),
        }
    }

    #[test]
    fn dot_identical_unit_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((dot(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dot_rejects_mismatched_lengths() {
        assert!(dot(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn max_sim_prefers_exact_token_match() {
        let query = mv(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let doc_matching = mv(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
        let doc_orthogonal = mv(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);

        let matching_score = max_sim(&query, &doc_matching);
        let orthogonal_score = max_sim(&query, &doc_orthogonal);

        // doc_matching has each query token's exact counterpart (sim=1 each => 2.0)
        assert!((matching_score - 2.0).abs() < 1e-5);
        // doc_orthogonal still contains both basis vectors, just permuted
        assert!((orthogonal_score - 2.0).abs() < 1e-5);
        assert!(matching_score >= orthogonal_score);
    }

    #[test]
    fn max_sim_empty_inputs_score_zero() {
        let empty = mv(vec![]);
        let doc = mv(vec![vec![1.0, 0.0]]);
        assert_eq!(max_sim(&empty, &doc), 0.0);
        assert_eq!(max_sim(&doc, &empty), 0.0);
    }

    #[test]
    fn fde_output_is_unit_norm() {
        let matrix = mv(vec![vec![3.0, 4.0], vec![1.0, 0.0]]);
        let fde = fixed_dimensional_encoding(&matrix);
        let norm = fde.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
