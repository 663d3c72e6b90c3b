//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;

/// Accumulator lanes used by the unrolled inner loop.
const LANES: usize = 8;

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// The dot product and both norms are accumulated in a single pass. Neither
/// vector may be all zeros; providers never return one, and the result for
/// such input is NaN.
///
/// # Panics
///
/// Panics if `a` and `b` have different dimensions. Stored embeddings all
/// come from one provider, so a mismatch is a programming error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "embedding dimension mismatch: {} vs {}",
        a.len(),
        b.len()
    );

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    let mut dot = [0.0f64; LANES];
    let mut norm_a = [0.0f64; LANES];
    let mut norm_b = [0.0f64; LANES];

    for (xs, ys) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            let x = f64::from(xs[lane]);
            let y = f64::from(ys[lane]);
            dot[lane] += x * y;
            norm_a[lane] += x * x;
            norm_b[lane] += y * y;
        }
    }

    let mut dot: f64 = dot.iter().sum();
    let mut norm_a: f64 = norm_a.iter().sum();
    let mut norm_b: f64 = norm_b.iter().sum();

    for (&x, &y) in a_tail.iter().zip(b_tail) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Rounding can push identical vectors a hair past 1.0.
    similarity.clamp(-1.0, 1.0) as f32
}

/// Position of a stored embedding together with its score against a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredIndex {
    /// Index into the candidate slice.
    pub index: usize,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Rank `candidates` against `query`.
///
/// Keeps candidates scoring at least `min_score`, orders them by descending
/// score and returns at most `k`. The sort is stable, so equal scores keep
/// their original index order.
pub fn rank_by_similarity(
    query: &[f32],
    candidates: &[Embedding],
    k: usize,
    min_score: f32,
) -> Vec<ScoredIndex> {
    let mut scored: Vec<ScoredIndex> = candidates
        .iter()
        .enumerate()
        .map(|(index, embedding)| ScoredIndex {
            index,
            score: cosine_similarity(query, embedding),
        })
        .filter(|hit| hit.score >= min_score)
        .collect();

    scored.sort_by_key(|hit| Reverse(OrderedFloat(hit.score)));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.5, 0.01, 7.0, 2.2, -0.4, 1.0, 9.1, 0.5, 3.3];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_matches_naive_across_lane_boundary() {
        let a: Vec<f32> = (0..1539).map(|i| ((i * 7) % 13) as f32 - 6.0).collect();
        let b: Vec<f32> = (0..1539).map(|i| ((i * 5) % 11) as f32 - 4.5).collect();

        let dot: f64 = a.iter().zip(&b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
        let na: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
        let nb: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
        let expected = (dot / (na * nb)) as f32;

        assert!((cosine_similarity(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_stays_in_bounds() {
        let vectors = [
            vec![1.0, 1.0, 1.0],
            vec![1e-20, 1e-20, 1e-20],
            vec![3.0e18, -2.0e18, 1.0e18],
            vec![-0.5, 0.25, 0.125],
        ];
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b);
                assert!((-1.0..=1.0).contains(&sim), "{sim} out of range");
            }
        }
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn test_dimension_mismatch_panics() {
        cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rank_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            vec![0.0, 1.0, 0.0], // similarity 0.0
            vec![1.0, 0.0, 0.0], // similarity 1.0
            vec![0.7, 0.7, 0.0], // similarity ~0.707
        ];

        let results = rank_by_similarity(&query, &candidates, 2, -1.0);
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_rank_by_similarity_applies_threshold() {
        let query = vec![1.0, 0.0];
        // Scores of 0.9 and 0.6 against the query.
        let candidates = vec![vec![0.9, (1.0f32 - 0.81).sqrt()], vec![0.6, 0.8]];

        let results = rank_by_similarity(&query, &candidates, 5, 0.7);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 0);
    }

    #[test]
    fn test_rank_by_similarity_keeps_index_order_on_ties() {
        let query = vec![0.0, 1.0];
        let candidates = vec![
            vec![0.0, 2.0],
            vec![1.0, 0.0],
            vec![0.0, 5.0],
            vec![0.0, 0.5],
        ];

        let results = rank_by_similarity(&query, &candidates, 10, 0.5);
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 2, 3]);
    }

    #[test]
    fn test_rank_by_similarity_empty_candidates() {
        let results = rank_by_similarity(&[1.0, 0.0], &[], 5, 0.0);
        assert!(results.is_empty());
    }
}
