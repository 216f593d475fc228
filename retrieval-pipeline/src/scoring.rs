use std::cmp::Ordering;

use tracing::warn;

/// Cap on the confidence reported for lexical fallback answers. Lexical
/// scores are unbounded, so the normalized value is a heuristic, not a
/// probability.
pub const LEXICAL_CONFIDENCE_CAP: f32 = 0.9;

/// Confidence reported when no tier qualified and the answer is ungrounded.
pub const FREE_GENERATION_CONFIDENCE: f32 = 0.5;

pub fn clamp_unit(value: f32) -> f32 {
    value.max(0.0).min(1.0)
}

/// Converts a cosine distance into a similarity in [0, 1].
///
/// Only valid for cosine distances, which lie in [0, 2]. A distance outside
/// that range means the index is configured with a different metric; the
/// value is flagged and clamped rather than silently accepted.
pub fn cosine_similarity(distance: f32) -> f32 {
    if !distance.is_finite() || !(0.0..=2.0).contains(&distance) {
        warn!(
            distance,
            "knn distance outside the cosine range [0, 2]; check the index metric"
        );
    }
    clamp_unit(1.0 - distance)
}

/// Normalizes a raw lexical score into a confidence value. Fixed heuristic:
/// score / 100 capped at [`LEXICAL_CONFIDENCE_CAP`].
pub fn lexical_confidence(score: f32) -> f32 {
    clamp_unit((score / 100.0).min(LEXICAL_CONFIDENCE_CAP))
}

/// Stable descending sort by score: equal scores keep their original rank.
pub fn sort_by_score_desc<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_inverts_distance() {
        assert!((cosine_similarity(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((cosine_similarity(0.25) - 0.75).abs() < f32::EPSILON);
        assert!((cosine_similarity(2.0) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_distance_is_clamped_into_unit_interval() {
        assert_eq!(cosine_similarity(-0.5), 1.0);
        assert_eq!(cosine_similarity(3.0), 0.0);
        assert_eq!(cosine_similarity(f32::NAN), 0.0);
    }

    #[test]
    fn lexical_confidence_is_score_over_hundred_capped() {
        assert!((lexical_confidence(12.0) - 0.12).abs() < f32::EPSILON);
        assert!((lexical_confidence(250.0) - 0.9).abs() < f32::EPSILON);
        assert_eq!(lexical_confidence(-3.0), 0.0);
    }

    #[test]
    fn sort_is_descending_and_stable_for_ties() {
        let mut items = vec![("a", 0.5_f32), ("b", 0.9), ("c", 0.5), ("d", 0.7)];
        sort_by_score_desc(&mut items, |item| item.1);
        let order: Vec<&str> = items.iter().map(|item| item.0).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }
}
