//! Stress scoring for a single frame.
//!
//! The stress score is the mean probability of the distress emotions
//! (angry, sad, fear) expressed as a percentage. Scoring is a pure function
//! of the vector.

use crate::collector::types::{EmotionLabel, EmotionVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores below this are reported as exactly zero.
pub const STRESS_FLOOR: f64 = 1.0;

/// Upper bound of the stress scale.
pub const STRESS_MAX: f64 = 100.0;

/// The scorer's verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressScore {
    /// Stress level, 0-100, two decimals
    pub stress: f64,
    /// Highest-probability label
    pub dominant: EmotionLabel,
}

/// A scored frame.
///
/// Immutable once built; the sliding window and the session log each keep
/// their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub vector: EmotionVector,
    pub dominant: EmotionLabel,
    pub stress: f64,
}

impl Sample {
    /// Score a vector captured at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>, vector: EmotionVector) -> Self {
        let StressScore { stress, dominant } = score(&vector);
        Self {
            timestamp,
            vector,
            dominant,
            stress,
        }
    }
}

/// Score one emotion vector.
///
/// Missing stress contributors count as 0.0 so a partially reported frame
/// still produces a score.
pub fn score(vector: &EmotionVector) -> StressScore {
    StressScore {
        stress: stress_level(vector),
        dominant: dominant_emotion(vector),
    }
}

/// Compute the stress level of a vector.
pub fn stress_level(vector: &EmotionVector) -> f64 {
    let contributors = EmotionLabel::STRESS_CONTRIBUTORS;
    let sum: f64 = contributors.iter().map(|&label| vector.get(label)).sum();
    round_stress(sum / contributors.len() as f64 * 100.0)
}

/// Apply the floor and rounding rules to a raw percentage.
///
/// Values under [`STRESS_FLOOR`] become 0; anything else is rounded to two
/// decimals and capped to [0, 100].
pub fn round_stress(raw: f64) -> f64 {
    if !raw.is_finite() || raw < STRESS_FLOOR {
        return 0.0;
    }
    round2(raw).min(STRESS_MAX)
}

/// Label with the highest probability.
///
/// Ties go to the label earlier in [`EmotionLabel::ALL`]. A vector with no
/// reported labels yields the first label, since every value reads as 0.0.
pub fn dominant_emotion(vector: &EmotionVector) -> EmotionLabel {
    let mut best = EmotionLabel::ALL[0];
    let mut best_p = vector.get(best);
    for label in EmotionLabel::ALL.into_iter().skip(1) {
        let p = vector.get(label);
        // Strict comparison keeps the earlier label on ties.
        if p > best_p {
            best = label;
            best_p = p;
        }
    }
    best
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(entries: &[(EmotionLabel, f64)]) -> EmotionVector {
        EmotionVector::new(entries.iter().copied())
    }

    fn angry_frame() -> EmotionVector {
        vector(&[
            (EmotionLabel::Angry, 0.6),
            (EmotionLabel::Sad, 0.1),
            (EmotionLabel::Fear, 0.1),
            (EmotionLabel::Happy, 0.1),
            (EmotionLabel::Disgust, 0.05),
            (EmotionLabel::Surprise, 0.03),
            (EmotionLabel::Neutral, 0.02),
        ])
    }

    #[test]
    fn test_angry_frame_scores_above_alert_level() {
        let result = score(&angry_frame());
        assert_eq!(result.dominant, EmotionLabel::Angry);
        assert!((result.stress - 26.67).abs() < 1e-9);
        assert!(result.stress > 25.0);
    }

    #[test]
    fn test_floor_and_rounding() {
        assert_eq!(round_stress(0.999), 0.0);
        assert_eq!(round_stress(1.2), 1.2);
        assert_eq!(round_stress(1.0), 1.0);
        assert_eq!(round_stress(33.3333), 33.33);
        assert_eq!(round_stress(f64::NAN), 0.0);
        assert_eq!(round_stress(140.0), 100.0);
    }

    #[test]
    fn test_low_stress_vectors_floor_to_zero() {
        let calm = vector(&[(EmotionLabel::Angry, 0.02997), (EmotionLabel::Happy, 0.97)]);
        assert_eq!(stress_level(&calm), 0.0);

        let mild = vector(&[(EmotionLabel::Fear, 0.036)]);
        assert!((stress_level(&mild) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_missing_contributors_read_as_zero() {
        let partial = vector(&[(EmotionLabel::Sad, 0.9)]);
        let result = score(&partial);
        assert_eq!(result.stress, 30.0);
        assert_eq!(result.dominant, EmotionLabel::Sad);

        let empty = EmotionVector::default();
        assert_eq!(score(&empty).stress, 0.0);
        assert_eq!(score(&empty).dominant, EmotionLabel::Angry);
    }

    #[test]
    fn test_out_of_range_entry_is_zero_substituted() {
        let result = score(&vector(&[
            (EmotionLabel::Angry, 1.7),
            (EmotionLabel::Happy, 0.5),
        ]));
        assert_eq!(result.stress, 0.0);
        assert_eq!(result.dominant, EmotionLabel::Happy);
    }

    #[test]
    fn test_stress_stays_in_range() {
        let saturated = vector(&[
            (EmotionLabel::Angry, 1.0),
            (EmotionLabel::Sad, 1.0),
            (EmotionLabel::Fear, 1.0),
        ]);
        assert_eq!(stress_level(&saturated), 100.0);

        for step in 0..=20 {
            let p = step as f64 / 20.0;
            let v = vector(&[
                (EmotionLabel::Angry, p),
                (EmotionLabel::Sad, 1.0 - p),
                (EmotionLabel::Fear, p / 2.0),
            ]);
            let s = stress_level(&v);
            assert!((0.0..=100.0).contains(&s), "stress {s} out of range");
        }
    }

    #[test]
    fn test_dominant_tie_break_uses_priority() {
        let tied = vector(&[(EmotionLabel::Happy, 0.4), (EmotionLabel::Fear, 0.4)]);
        assert_eq!(dominant_emotion(&tied), EmotionLabel::Fear);

        let tied = vector(&[(EmotionLabel::Neutral, 0.5), (EmotionLabel::Surprise, 0.5)]);
        assert_eq!(dominant_emotion(&tied), EmotionLabel::Surprise);
    }

    #[test]
    fn test_sample_carries_score() {
        let at = Utc::now();
        let sample = Sample::new(at, angry_frame());
        assert_eq!(sample.timestamp, at);
        assert_eq!(sample.dominant, EmotionLabel::Angry);
        assert_eq!(sample.stress, score(&angry_frame()).stress);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let frame = angry_frame();
        assert_eq!(score(&frame), score(&frame.clone()));
    }
}
