//! Pure scoring helpers: cosine similarity, stepwise recency weighting,
//! and the freshness glyphs other components key off.

use chrono::Duration;

/// Glyph marking a result younger than 24 hours. The proactive loop scans
/// formatted search output for this marker.
pub const FRESH_GLYPH: &str = "🆕";
pub const RECENT_GLYPH: &str = "📅";
pub const ARCHIVE_GLYPH: &str = "📜";

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Stepwise recency weight by document age.
pub fn recency_score(age: Duration) -> f32 {
    let hours = age.num_hours();
    match hours {
        h if h <= 24 => 1.0,
        h if h <= 72 => 0.8,
        h if h <= 168 => 0.6,
        h if h <= 336 => 0.3,
        h if h <= 720 => 0.1,
        _ => 0.05,
    }
}

pub fn freshness_glyph(age: Duration) -> &'static str {
    if age < Duration::hours(24) {
        FRESH_GLYPH
    } else if age < Duration::days(7) {
        RECENT_GLYPH
    } else {
        ARCHIVE_GLYPH
    }
}

/// Combined relevance for ranking.
///
/// `expanded` applies the age penalty used when the search had to fall back
/// past the 7-day window.
pub fn relevance(similarity: f32, age: Duration, boost_age_hours: i64, expanded: bool) -> f32 {
    let recency = recency_score(age);
    let boost = if age < Duration::hours(boost_age_hours) {
        1.5
    } else {
        1.0
    };
    let penalty = if expanded { recency.max(0.1) } else { 1.0 };
    similarity * recency * boost * penalty
}

/// Embedding vectors persist as little-endian f32 BLOBs.
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

pub fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.2, -0.3];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn recency_steps_down_with_age() {
        assert_eq!(recency_score(Duration::hours(1)), 1.0);
        assert_eq!(recency_score(Duration::hours(48)), 0.8);
        assert_eq!(recency_score(Duration::days(5)), 0.6);
        assert_eq!(recency_score(Duration::days(10)), 0.3);
        assert_eq!(recency_score(Duration::days(20)), 0.1);
        assert_eq!(recency_score(Duration::days(60)), 0.05);
    }

    #[test]
    fn glyph_boundaries() {
        assert_eq!(freshness_glyph(Duration::hours(2)), FRESH_GLYPH);
        assert_eq!(freshness_glyph(Duration::days(3)), RECENT_GLYPH);
        assert_eq!(freshness_glyph(Duration::days(10)), ARCHIVE_GLYPH);
    }

    #[test]
    fn fresh_documents_get_boosted() {
        let fresh = relevance(0.9, Duration::hours(1), 24, false);
        let day_old = relevance(0.9, Duration::hours(30), 24, false);
        assert!(fresh > day_old);
        assert!((fresh - 0.9 * 1.0 * 1.5).abs() < 1e-6);
    }

    #[test]
    fn expanded_search_applies_age_penalty() {
        let narrow = relevance(0.9, Duration::days(60), 24, false);
        let expanded = relevance(0.9, Duration::days(60), 24, true);
        assert!(expanded < narrow);
        // Penalty floors at 0.1.
        assert!((expanded - 0.9 * 0.05 * 0.1).abs() < 1e-6);
    }

    #[test]
    fn blob_round_trip() {
        let v = vec![1.0f32, -0.25, 3.75, 0.0];
        assert_eq!(blob_to_vector(&vector_to_blob(&v)), v);
    }
}
