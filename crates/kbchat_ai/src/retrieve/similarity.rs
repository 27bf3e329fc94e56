use std::cmp::Ordering;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity with precomputed norms.
///
/// Zero-norm and non-finite inputs score 0. The result is never `-0.0`, so
/// equal scores compare equal under `total_cmp`.
pub fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let score = dot(a, b) / (a_norm * b_norm);
    if score.is_finite() {
        score + 0.0
    } else {
        0.0
    }
}

/// Ranking order: higher score first, then lower ordinal.
pub(crate) fn by_rank(a: (u32, f32), b: (u32, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}
