use ndarray::ArrayView1;

/// Calculate cosine similarity between two vectors.
///
/// Returns `None` when the lengths differ or either vector has zero norm,
/// since the angle is undefined there.
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot_product / (norm_a * norm_b))
}

/// `1 - cosine_similarity`; lower means more alike.
pub fn cosine_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
    cosine_similarity(a, b).map(|similarity| 1.0 - similarity)
}
