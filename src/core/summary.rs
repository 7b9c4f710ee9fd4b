//! End-of-session statistics.
//!
//! A [`SessionSummary`] is derived from a closed [`Session`] on demand and is
//! never stored on its own. Summarizing only reads the session.

use crate::collector::types::EmotionLabel;
use crate::core::scoring::round2;
use crate::core::session::{Feedback, Session, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fmt;

/// Share of samples dominated by one label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionShare {
    pub label: EmotionLabel,
    /// Percentage of samples, two decimals
    pub percent: f64,
}

/// Statistics for one closed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    /// Seconds from start to stop, defined even with no samples
    pub duration_secs: f64,
    pub sample_count: usize,
    /// Mean stress, two decimals; None when there is no data
    pub average_stress: Option<f64>,
    /// Most frequent dominant label; None when there is no data
    pub dominant_emotion: Option<EmotionLabel>,
    /// Labels seen at least once, by descending share
    pub emotion_distribution: Vec<EmotionShare>,
}

impl SessionSummary {
    /// Whether the session produced any samples.
    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session Summary:")?;
        writeln!(f, "- Duration: {:.1} seconds", self.duration_secs)?;
        writeln!(f, "- Frames analysed: {}", self.sample_count)?;
        match self.average_stress {
            Some(avg) => writeln!(f, "- Average stress: {avg:.2}%")?,
            None => writeln!(f, "- Average stress: no data")?,
        }
        match self.dominant_emotion {
            Some(label) => writeln!(f, "- Dominant emotion: {label}")?,
            None => writeln!(f, "- Dominant emotion: no data")?,
        }
        if self.emotion_distribution.is_empty() {
            write!(f, "- Emotion distribution: no data")
        } else {
            write!(f, "- Emotion distribution:")?;
            for share in &self.emotion_distribution {
                write!(f, "\n    {:<9} {:>6.2}%", share.label, share.percent)?;
            }
            Ok(())
        }
    }
}

/// Summarize a session.
///
/// An active session is summarized up to now as if it were closed at its
/// latest sample (or at its start when empty).
pub fn summarize(session: &Session) -> SessionSummary {
    let samples = session.samples();
    let duration_secs = session.duration_secs().unwrap_or_else(|| {
        let end = samples.last().map(|s| s.timestamp).unwrap_or(session.started_at);
        ((end - session.started_at).num_milliseconds().max(0)) as f64 / 1000.0
    });

    if samples.is_empty() {
        return SessionSummary {
            session_id: session.id,
            duration_secs,
            sample_count: 0,
            average_stress: None,
            dominant_emotion: None,
            emotion_distribution: Vec::new(),
        };
    }

    let average_stress = round2(samples.iter().map(|s| s.stress).mean());

    let mut counts: BTreeMap<EmotionLabel, usize> = BTreeMap::new();
    for sample in samples {
        *counts.entry(sample.dominant).or_insert(0) += 1;
    }

    let total = samples.len() as f64;
    let mut emotion_distribution: Vec<EmotionShare> = counts
        .iter()
        .map(|(&label, &count)| EmotionShare {
            label,
            percent: round2(count as f64 / total * 100.0),
        })
        .collect();
    // Stable sort keeps priority order (the BTreeMap order) among equal shares.
    emotion_distribution.sort_by(|a, b| b.percent.total_cmp(&a.percent));

    SessionSummary {
        session_id: session.id,
        duration_secs,
        sample_count: samples.len(),
        average_stress: Some(average_stress),
        dominant_emotion: mode_label(&counts),
        emotion_distribution,
    }
}

/// Most frequent label; ties go to the higher-priority label.
fn mode_label(counts: &BTreeMap<EmotionLabel, usize>) -> Option<EmotionLabel> {
    let mut best: Option<(EmotionLabel, usize)> = None;
    for (&label, &count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label)
}

/// One point of the stress timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub stress: f64,
    pub dominant: EmotionLabel,
}

/// Exportable record of a closed session.
///
/// Carries the derived summary and the stress timeline; raw probability
/// vectors are left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: SessionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub stress_timeline: Vec<TimelinePoint>,
}

impl SessionReport {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            summary: summarize(session),
            feedback: session.feedback().cloned(),
            stress_timeline: session
                .samples()
                .iter()
                .map(|s| TimelinePoint {
                    timestamp: s.timestamp,
                    stress: s.stress,
                    dominant: s.dominant,
                })
                .collect(),
        }
    }
}
