//! Distance between vectors.

/// Euclidean (L2) distance between two vectors of equal length.
///
/// Only the common prefix is compared if lengths differ; callers validate
/// dimensions before scoring.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
