// Cosine similarity and deterministic top-k selection
use std::cmp::Ordering;

/// Cosine of the angle between `a` and `b`.
///
/// Returns 0.0 when either vector has zero norm, when the lengths differ, or
/// when the inputs contain non-finite values.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Position in the index paired with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub position: usize,
    pub score: f32,
}

/// Highest score first; equal scores keep index order
fn by_relevance(a: &Ranked, b: &Ranked) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

/// Score every vector against `query` and keep the best `k`, most similar first
pub fn top_k<'a, I>(query: &[f32], vectors: I, k: usize) -> Vec<Ranked>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<Ranked> = vectors
        .into_iter()
        .enumerate()
        .map(|(position, v)| Ranked {
            position,
            score: cosine_similarity(query, v),
        })
        .collect();

    if ranked.len() > k {
        ranked.select_nth_unstable_by(k - 1, by_relevance);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(by_relevance);
    ranked
}
