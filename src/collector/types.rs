//! Frame-level types delivered by the external emotion classifier.
//!
//! A frame is reduced to seven emotion probabilities before it reaches this
//! crate. Pixels and face crops never cross this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// The closed emotion vocabulary.
///
/// Variant order is the fixed tie-break priority used everywhere a "dominant"
/// label is chosen: on equal values the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All labels, in priority order.
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    /// Labels whose probabilities feed the stress score.
    pub const STRESS_CONTRIBUTORS: [EmotionLabel; 3] =
        [EmotionLabel::Angry, EmotionLabel::Sad, EmotionLabel::Fear];

    /// Lowercase name, as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Position in the tie-break order (0 = highest priority).
    pub fn priority(&self) -> usize {
        *self as usize
    }

    /// Parse a comma-separated list such as `"angry, Sad"`.
    ///
    /// Blank entries are skipped; any unknown entry fails the whole list.
    pub fn parse_list(s: &str) -> Result<Vec<EmotionLabel>, LabelParseError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(EmotionLabel::from_str)
            .collect()
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emotion name outside the seven-label vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label '{0}'")]
pub struct LabelParseError(pub String);

impl FromStr for EmotionLabel {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        EmotionLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == lower)
            .ok_or_else(|| LabelParseError(s.to_string()))
    }
}

/// Per-frame emotion probabilities.
///
/// Labels the classifier did not report are absent and read as 0.0. A
/// reported entry that is not a usable probability (not a number, not finite,
/// or outside [0, 1]) is stored as 0.0, so the rest of the frame still scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "HashMap<String, serde_json::Value>",
    into = "BTreeMap<EmotionLabel, f64>"
)]
pub struct EmotionVector {
    probabilities: BTreeMap<EmotionLabel, f64>,
}

impl EmotionVector {
    /// Build a vector from `(label, probability)` pairs.
    ///
    /// Values that are not finite or fall outside [0, 1] are replaced by 0.0.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (EmotionLabel, f64)>,
    {
        let probabilities = entries
            .into_iter()
            .map(|(label, p)| (label, sanitize_probability(p)))
            .collect();
        Self { probabilities }
    }

    /// Probability for a label, 0.0 when the classifier omitted it.
    pub fn get(&self, label: EmotionLabel) -> f64 {
        self.probabilities.get(&label).copied().unwrap_or(0.0)
    }

    /// Whether all seven labels are present.
    pub fn is_complete(&self) -> bool {
        self.probabilities.len() == EmotionLabel::ALL.len()
    }

    /// Whether no label at all was reported.
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Iterate over reported labels in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f64)> + '_ {
        self.probabilities.iter().map(|(label, p)| (*label, *p))
    }
}

fn sanitize_probability(p: f64) -> f64 {
    if (0.0..=1.0).contains(&p) {
        p
    } else {
        0.0
    }
}

impl From<HashMap<String, serde_json::Value>> for EmotionVector {
    fn from(raw: HashMap<String, serde_json::Value>) -> Self {
        // Unknown keys are the classifier's business, not an error here.
        Self::new(raw.into_iter().filter_map(|(name, value)| {
            let label = EmotionLabel::from_str(&name).ok()?;
            Some((label, value.as_f64().unwrap_or(0.0)))
        }))
    }
}

impl From<EmotionVector> for BTreeMap<EmotionLabel, f64> {
    fn from(vector: EmotionVector) -> Self {
        vector.probabilities
    }
}

/// One line of classifier output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture time; stamped on receipt when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Probabilities, or null when no face was classified
    #[serde(default)]
    pub emotions: Option<EmotionVector>,
}

impl FrameInput {
    /// Resolve into a frame event, stamping `now` if the input had no time.
    pub fn into_event(self, now: DateTime<Utc>) -> FrameEvent {
        let timestamp = self.timestamp.unwrap_or(now);
        match self.emotions {
            Some(vector) if !vector.is_empty() => FrameEvent::Frame { timestamp, vector },
            _ => FrameEvent::Unavailable { timestamp },
        }
    }
}

/// Unified event type for the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FrameEvent {
    /// A classified frame.
    Frame {
        timestamp: DateTime<Utc>,
        vector: EmotionVector,
    },
    /// Capture or classification produced nothing usable.
    Unavailable { timestamp: DateTime<Utc> },
}

impl FrameEvent {
    /// A classified frame stamped with the current time.
    pub fn now(vector: EmotionVector) -> Self {
        FrameEvent::Frame {
            timestamp: Utc::now(),
            vector,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FrameEvent::Frame { timestamp, .. } | FrameEvent::Unavailable { timestamp } => {
                *timestamp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_is_case_insensitive() {
        assert_eq!("Angry".parse::<EmotionLabel>(), Ok(EmotionLabel::Angry));
        assert_eq!(" neutral ".parse::<EmotionLabel>(), Ok(EmotionLabel::Neutral));
        assert!("contempt".parse::<EmotionLabel>().is_err());
    }

    #[test]
    fn test_parse_list() {
        let labels = EmotionLabel::parse_list("happy, Sad,,").unwrap();
        assert_eq!(labels, vec![EmotionLabel::Happy, EmotionLabel::Sad]);
        assert!(EmotionLabel::parse_list("happy,bored").is_err());
        assert!(EmotionLabel::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_priority_follows_classifier_order() {
        let priorities: Vec<usize> = EmotionLabel::ALL.iter().map(|l| l.priority()).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_out_of_range_values_become_zero() {
        let vector = EmotionVector::new([
            (EmotionLabel::Angry, 1.7),
            (EmotionLabel::Sad, -0.2),
            (EmotionLabel::Fear, f64::NAN),
            (EmotionLabel::Happy, 0.5),
            (EmotionLabel::Neutral, 1.0),
        ]);
        assert_eq!(vector.get(EmotionLabel::Angry), 0.0);
        assert_eq!(vector.get(EmotionLabel::Sad), 0.0);
        assert_eq!(vector.get(EmotionLabel::Fear), 0.0);
        assert_eq!(vector.get(EmotionLabel::Happy), 0.5);
        assert_eq!(vector.get(EmotionLabel::Neutral), 1.0);
        assert!(!vector.is_complete());
    }

    #[test]
    fn test_malformed_entries_keep_frame() {
        for line in [
            r#"{"emotions": {"angry": null, "sad": 0.9, "fear": 0.6}}"#,
            r#"{"emotions": {"angry": "high", "sad": 0.9, "fear": 0.6}}"#,
            r#"{"emotions": {"angry": 3, "sad": 0.9, "fear": 0.6}}"#,
        ] {
            let input: FrameInput = serde_json::from_str(line).unwrap();
            match input.into_event(Utc::now()) {
                FrameEvent::Frame { vector, .. } => {
                    assert_eq!(vector.get(EmotionLabel::Angry), 0.0);
                    assert_eq!(vector.get(EmotionLabel::Sad), 0.9);
                    assert_eq!(vector.get(EmotionLabel::Fear), 0.6);
                }
                other => panic!("expected a frame for {line}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_frame_input_json() {
        let line = r#"{"emotions": {"Angry": 0.5, "happy": 0.25, "contempt": 0.9}}"#;
        let input: FrameInput = serde_json::from_str(line).unwrap();
        let now = Utc::now();

        match input.into_event(now) {
            FrameEvent::Frame { timestamp, vector } => {
                assert_eq!(timestamp, now);
                assert_eq!(vector.get(EmotionLabel::Angry), 0.5);
                assert_eq!(vector.get(EmotionLabel::Happy), 0.25);
                assert_eq!(vector.iter().count(), 2);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_null_or_empty_emotions_are_unavailable() {
        for line in [r#"{"emotions": null}"#, r#"{"emotions": {}}"#, "{}"] {
            let input: FrameInput = serde_json::from_str(line).unwrap();
            assert!(matches!(
                input.into_event(Utc::now()),
                FrameEvent::Unavailable { .. }
            ));
        }
    }
}
