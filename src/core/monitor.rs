//! Frame-driven monitoring engine.
//!
//! [`Monitor`] is the single owner of the session state. Each frame is
//! scored, appended to the session log, and pushed to the live window before
//! the call returns, and lifecycle requests take `&mut self` as well, so a
//! start, stop, or feedback submission can only land between two frames.

use crate::collector::types::{EmotionLabel, FrameEvent};
use crate::core::scoring::Sample;
use crate::core::session::{
    Feedback, FeedbackError, LifecycleError, RecorderState, Session, SessionId, SessionRecorder,
    StartOutcome,
};
use crate::core::summary::{summarize, SessionReport, SessionSummary};
use crate::core::windowing::{SlidingWindow, DEFAULT_HORIZON_SECS};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stress level above which the live view raises an alert.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 25.0;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Live window horizon in seconds
    pub window_horizon_secs: u64,
    /// Alert when stress is strictly above this
    pub alert_threshold: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            window_horizon_secs: DEFAULT_HORIZON_SECS,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

/// What the display collaborator renders after each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub stress: f64,
    pub dominant: EmotionLabel,
    pub alert: bool,
    /// Stress values in the live window, oldest first
    pub window: Vec<f64>,
}

/// Why a frame produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Capture or classification produced nothing
    FrameUnavailable,
    /// No session is recording
    NoActiveSession,
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Recorded(LiveUpdate),
    Skipped(SkipReason),
}

/// Read-only view of the live state between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveView {
    pub state: RecorderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_stress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_dominant: Option<EmotionLabel>,
    pub alert: bool,
    pub window: Vec<f64>,
}

/// Stress monitoring engine.
pub struct Monitor {
    settings: MonitorSettings,
    recorder: SessionRecorder,
    transparency: SharedTransparencyLog,
}

impl Monitor {
    /// Create a monitor with its own transparency log.
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_transparency(settings, create_shared_log())
    }

    /// Create a monitor that reports into a shared transparency log.
    pub fn with_transparency(settings: MonitorSettings, transparency: SharedTransparencyLog) -> Self {
        Self {
            recorder: SessionRecorder::new(SlidingWindow::new(settings.window_horizon_secs)),
            settings,
            transparency,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// Start monitoring now.
    pub fn start(&mut self) -> StartOutcome {
        self.start_at(Utc::now())
    }

    /// Start monitoring at a given time. A no-op while already active.
    pub fn start_at(&mut self, now: DateTime<Utc>) -> StartOutcome {
        self.recorder.start(now)
    }

    /// Stop monitoring now.
    pub fn stop(&mut self) -> Result<SessionSummary, LifecycleError> {
        self.stop_at(Utc::now())
    }

    /// Stop monitoring at a given time and summarize the closed session.
    pub fn stop_at(&mut self, now: DateTime<Utc>) -> Result<SessionSummary, LifecycleError> {
        let session = self.recorder.stop(now)?;
        let summary = summarize(session);
        self.transparency.record_session_completed();
        Ok(summary)
    }

    /// Score and record one frame.
    pub fn process_frame(&mut self, event: FrameEvent) -> FrameOutcome {
        let (timestamp, vector) = match event {
            FrameEvent::Frame { timestamp, vector } => (timestamp, vector),
            FrameEvent::Unavailable { .. } => {
                self.transparency.record_frame_skipped();
                tracing::debug!("frame unavailable, skipping");
                return FrameOutcome::Skipped(SkipReason::FrameUnavailable);
            }
        };

        let Some(session_id) = self.recorder.active().map(|s| s.id) else {
            self.transparency.record_frame_skipped();
            return FrameOutcome::Skipped(SkipReason::NoActiveSession);
        };

        if !vector.is_complete() {
            tracing::debug!(session = %session_id, "partial emotion vector, missing labels read as 0");
        }

        let sample = Sample::new(timestamp, vector);
        let (stress, dominant) = (sample.stress, sample.dominant);
        let Some(window) = self.recorder.record(sample) else {
            self.transparency.record_frame_skipped();
            return FrameOutcome::Skipped(SkipReason::NoActiveSession);
        };
        // The recorder may have moved an out-of-order timestamp forward.
        let timestamp = self
            .recorder
            .window()
            .newest_timestamp()
            .unwrap_or(timestamp);

        let alert = self.is_alert(stress);
        self.transparency.record_frame_processed();
        if alert {
            self.transparency.record_alert();
        }

        FrameOutcome::Recorded(LiveUpdate {
            session_id,
            timestamp,
            stress,
            dominant,
            alert,
            window,
        })
    }

    /// Attach feedback to the last closed session.
    pub fn submit_feedback<I>(
        &mut self,
        session_id: SessionId,
        labels: I,
    ) -> Result<Feedback, FeedbackError>
    where
        I: IntoIterator<Item = EmotionLabel>,
    {
        let feedback = self
            .recorder
            .submit_feedback(session_id, labels, Utc::now())?
            .clone();
        self.transparency.record_feedback_submitted();
        Ok(feedback)
    }

    /// Current live state.
    pub fn live(&self) -> LiveView {
        let window = self.recorder.window();
        let latest = window.latest();
        LiveView {
            state: self.recorder.state(),
            session_id: self.recorder.current().map(|s| s.id),
            latest_stress: latest.map(|s| s.stress),
            latest_dominant: latest.map(|s| s.dominant),
            alert: latest.map(|s| self.is_alert(s.stress)).unwrap_or(false),
            window: window.current(),
        }
    }

    /// Active or last closed session.
    pub fn current_session(&self) -> Option<&Session> {
        self.recorder.current()
    }

    /// Summary of the last closed session.
    pub fn last_summary(&self) -> Option<SessionSummary> {
        self.recorder.last_closed().map(summarize)
    }

    /// Exportable report of the last closed session.
    pub fn last_report(&self) -> Option<SessionReport> {
        self.recorder.last_closed().map(SessionReport::from_session)
    }

    fn is_alert(&self, stress: f64) -> bool {
        stress > self.settings.alert_threshold
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::EmotionVector;
    use chrono::Duration;

    fn frame(at: DateTime<Utc>, entries: &[(EmotionLabel, f64)]) -> FrameEvent {
        FrameEvent::Frame {
            timestamp: at,
            vector: EmotionVector::new(entries.iter().copied()),
        }
    }

    #[test]
    fn test_frames_ignored_while_idle() {
        let mut monitor = Monitor::default();
        let outcome = monitor.process_frame(frame(Utc::now(), &[(EmotionLabel::Sad, 0.9)]));
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NoActiveSession));
        assert_eq!(monitor.transparency().stats().frames_skipped, 1);
    }

    #[test]
    fn test_unavailable_frame_is_skipped_without_sample() {
        let mut monitor = Monitor::default();
        let t0 = Utc::now();
        monitor.start_at(t0);

        let outcome = monitor.process_frame(FrameEvent::Unavailable { timestamp: t0 });
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::FrameUnavailable));
        assert_eq!(monitor.current_session().unwrap().sample_count(), 0);

        let summary = monitor.stop_at(t0 + Duration::seconds(1)).unwrap();
        assert!(!summary.has_data());
    }

    #[test]
    fn test_alert_is_strictly_above_threshold() {
        let mut monitor = Monitor::default();
        let t0 = Utc::now();
        monitor.start_at(t0);

        // Exactly 25.0 stress does not alert.
        let FrameOutcome::Recorded(calm) =
            monitor.process_frame(frame(t0, &[(EmotionLabel::Angry, 0.75)]))
        else {
            panic!("frame should be recorded");
        };
        assert_eq!(calm.stress, 25.0);
        assert!(!calm.alert);

        let FrameOutcome::Recorded(tense) = monitor.process_frame(frame(
            t0 + Duration::seconds(1),
            &[(EmotionLabel::Angry, 0.6), (EmotionLabel::Sad, 0.1), (EmotionLabel::Fear, 0.1)],
        )) else {
            panic!("frame should be recorded");
        };
        assert!(tense.alert);
        assert_eq!(tense.window, vec![25.0, 26.67]);
        assert!(monitor.live().alert);
        assert_eq!(monitor.transparency().stats().alerts_raised, 1);
    }

    #[test]
    fn test_custom_settings() {
        let settings = MonitorSettings {
            window_horizon_secs: 5,
            alert_threshold: 10.0,
        };
        let mut monitor = Monitor::new(settings);
        let t0 = Utc::now();
        monitor.start_at(t0);
        monitor.process_frame(frame(t0, &[(EmotionLabel::Fear, 0.6)]));
        let FrameOutcome::Recorded(update) = monitor.process_frame(frame(
            t0 + Duration::seconds(6),
            &[(EmotionLabel::Fear, 0.45)],
        )) else {
            panic!("frame should be recorded");
        };
        assert_eq!(update.window, vec![15.0]);
        assert!(update.alert);
    }

    #[test]
    fn test_stop_summarizes_and_counts() {
        let mut monitor = Monitor::default();
        let t0 = Utc::now();
        let id = monitor.start_at(t0).session_id();
        monitor.process_frame(frame(t0, &[(EmotionLabel::Happy, 0.9)]));

        let summary = monitor.stop_at(t0 + Duration::seconds(10)).unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.dominant_emotion, Some(EmotionLabel::Happy));
        assert_eq!(monitor.last_summary(), Some(summary));
        assert_eq!(monitor.transparency().stats().sessions_completed, 1);
        assert_eq!(monitor.stop_at(t0).unwrap_err(), LifecycleError::NotActive);
        assert_eq!(monitor.state(), RecorderState::Idle);
    }

    #[test]
    fn test_feedback_through_monitor() {
        let mut monitor = Monitor::default();
        let t0 = Utc::now();
        let id = monitor.start_at(t0).session_id();
        monitor.stop_at(t0).unwrap();

        let feedback = monitor
            .submit_feedback(id, [EmotionLabel::Neutral])
            .unwrap();
        assert!(feedback.labels.contains(&EmotionLabel::Neutral));
        assert!(monitor.submit_feedback(id, [EmotionLabel::Sad]).is_err());

        let report = monitor.last_report().unwrap();
        assert!(report.feedback.is_some());
        assert_eq!(monitor.transparency().stats().feedback_submitted, 1);
    }

    #[test]
    fn test_live_view_when_idle() {
        let monitor = Monitor::default();
        let live = monitor.live();
        assert_eq!(live.state, RecorderState::Idle);
        assert!(live.window.is_empty());
        assert!(!live.alert);
        assert!(live.session_id.is_none());
    }
}
