//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and top-k selection over precomputed
//! embeddings. Used by the vector relevance tier.

use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is empty, zero-magnitude, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 || !denom.is_finite() {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank candidate vectors by cosine similarity to `query`.
///
/// `candidates` yields `(index, embedding)` pairs; entries without an
/// embedding are simply not yielded, and embeddings whose length differs
/// from the query's are skipped. Returns `(index, similarity)` sorted by
/// descending similarity (ties by ascending index), keeping only scores
/// `>= min_score`, truncated to `limit`.
pub fn top_k_by_similarity<'a>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (usize, &'a [f32])>,
    limit: usize,
    min_score: f32,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .filter(|(_, emb)| emb.len() == query.len())
        .map(|(idx, emb)| (idx, cosine_similarity(emb, query)))
        .filter(|(_, sim)| *sim >= min_score)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    scored
}

/// Serialize an embedding vector to little-endian bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian bytes into an embedding vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero_not_nan() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
        assert_eq!(cosine_similarity(&a, &a), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn top_k_ranks_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let a = vec![0.0, 1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.5, 0.5, 0.0];
        let ranked = top_k_by_similarity(
            &query,
            [(0, a.as_slice()), (1, b.as_slice()), (2, c.as_slice())],
            10,
            0.0,
        );
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn top_k_respects_threshold_and_limit() {
        let query = vec![1.0, 0.0];
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32]).collect();
        let ranked = top_k_by_similarity(
            &query,
            vectors.iter().enumerate().map(|(i, v)| (i, v.as_slice())),
            3,
            0.3,
        );
        // cos = 1/sqrt(1+i^2): i = 0..=3 clear 0.3, the limit keeps three
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|(_, s)| *s >= 0.3));
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn top_k_ties_break_by_index() {
        let query = vec![1.0, 0.0];
        let v = vec![2.0, 0.0];
        let ranked = top_k_by_similarity(&query, [(3, v.as_slice()), (1, v.as_slice())], 10, 0.0);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 3);
    }

    #[test]
    fn top_k_skips_mismatched_lengths_even_below_zero_threshold() {
        let query = vec![1.0, 0.0];
        let short = vec![1.0];
        let aligned = vec![0.0, 1.0];
        let ranked = top_k_by_similarity(
            &query,
            [(0, short.as_slice()), (1, aligned.as_slice())],
            10,
            -1.0,
        );
        assert_eq!(ranked, vec![(1, 0.0)]);
    }

    #[test]
    fn blob_roundtrip_preserves_values() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&v)), v);
        assert_eq!(blob_to_embedding(&[0, 0, 128]), Vec::<f32>::new());
    }
}
