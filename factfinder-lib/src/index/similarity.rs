/// Scale a vector to unit length, widening to `f64`.
///
/// A zero vector stays zero, so it scores 0.0 against everything.
pub fn normalize(v: &[f32]) -> Vec<f64> {
    let norm = v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();

    if norm == 0.0 {
        return vec![0.0; v.len()];
    }

    v.iter().map(|&x| f64::from(x) / norm).collect()
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    dot(&normalize(a), &normalize(b))
}
