//! Feature matchers: pure functions comparing one stored feature payload
//! against one query payload. Dimension mismatches yield `None` so callers
//! uniformly treat them as "not satisfied" rather than an error.

use edgematch_core::types::DistanceMetric;

/// Membership test: true iff the two string sequences share at least one
/// element. Not a superset test.
pub fn intersects(stored: &[String], target: &[String]) -> bool {
    stored.iter().any(|s| target.iter().any(|t| t == s))
}

/// Distance between two equal-length vectors under `metric`.
pub fn vector_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let distance = match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
    };
    Some(distance)
}

/// Cosine similarity of two equal-length vectors. `None` on dimension
/// mismatch or when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
