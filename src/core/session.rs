//! Monitoring sessions and their lifecycle.
//!
//! A [`SessionRecorder`] is either idle or recording exactly one active
//! [`Session`]. Stopping closes the session; a closed session is read-only
//! except for a single feedback submission. Starting a new session discards
//! the previous one along with its sample log.

use crate::collector::types::EmotionLabel;
use crate::core::scoring::Sample;
use crate::core::windowing::SlidingWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Identifier of one monitoring session.
pub type SessionId = Uuid;

/// User-entered ground truth for a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub labels: BTreeSet<EmotionLabel>,
    pub submitted_at: DateTime<Utc>,
}

/// One continuous monitoring interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    /// None while the session is active
    pub ended_at: Option<DateTime<Utc>>,
    samples: Vec<Sample>,
    feedback: Option<Feedback>,
}

impl Session {
    fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            ended_at: None,
            samples: Vec::new(),
            feedback: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Samples in arrival order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Seconds from start to close; None while active.
    ///
    /// Never negative, even if the wall clock stepped backwards.
    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at.map(|end| {
            let millis = (end - self.started_at).num_milliseconds().max(0);
            millis as f64 / 1000.0
        })
    }

    fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }
}

/// Lifecycle state of the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Active,
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was opened.
    Started(SessionId),
    /// A session was already recording; nothing changed.
    AlreadyActive(SessionId),
}

impl StartOutcome {
    pub fn session_id(&self) -> SessionId {
        match self {
            StartOutcome::Started(id) | StartOutcome::AlreadyActive(id) => *id,
        }
    }
}

/// Rejected lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("no session is being recorded")]
    NotActive,
}

/// Rejected feedback submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback must name at least one emotion")]
    EmptyLabels,
    #[error("session {0} is still being recorded")]
    SessionActive(SessionId),
    #[error("feedback for session {0} was already submitted")]
    AlreadySubmitted(SessionId),
    #[error("session {0} is not known")]
    UnknownSession(SessionId),
}

/// Owns the current session and the live window.
#[derive(Debug)]
pub struct SessionRecorder {
    /// Active session, or the most recently closed one
    current: Option<Session>,
    window: SlidingWindow,
}

impl SessionRecorder {
    pub fn new(window: SlidingWindow) -> Self {
        Self {
            current: None,
            window,
        }
    }

    pub fn state(&self) -> RecorderState {
        match &self.current {
            Some(session) if session.is_active() => RecorderState::Active,
            _ => RecorderState::Idle,
        }
    }

    /// Open a session at `now`.
    ///
    /// Idempotent: while a session is active this changes nothing.
    pub fn start(&mut self, now: DateTime<Utc>) -> StartOutcome {
        if let Some(session) = self.active() {
            return StartOutcome::AlreadyActive(session.id);
        }
        let session = Session::open(now);
        let id = session.id;
        self.current = Some(session);
        self.window.clear();
        tracing::info!(session = %id, "session started");
        StartOutcome::Started(id)
    }

    /// Append a sample to the active session and the window.
    ///
    /// Returns the window values after the push, or None when idle. A sample
    /// stamped earlier than the previous one, or than the session start, is
    /// moved up to it.
    pub fn record(&mut self, mut sample: Sample) -> Option<Vec<f64>> {
        let session = self.current.as_mut().filter(|s| s.is_active())?;
        let floor = session.last_timestamp().unwrap_or(session.started_at);
        if sample.timestamp < floor {
            tracing::debug!(session = %session.id, "clamping out-of-order frame timestamp");
            sample.timestamp = floor;
        }
        session.samples.push(sample.clone());
        Some(self.window.push(sample))
    }

    /// Close the active session at `now` and return it.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<&Session, LifecycleError> {
        let session = self
            .current
            .as_mut()
            .filter(|s| s.is_active())
            .ok_or(LifecycleError::NotActive)?;
        // Never close before the session opened.
        session.ended_at = Some(now.max(session.started_at));
        tracing::info!(
            session = %session.id,
            samples = session.samples.len(),
            "session stopped"
        );
        Ok(session)
    }

    /// Attach feedback to a closed session, once.
    pub fn submit_feedback<I>(
        &mut self,
        session_id: SessionId,
        labels: I,
        now: DateTime<Utc>,
    ) -> Result<&Feedback, FeedbackError>
    where
        I: IntoIterator<Item = EmotionLabel>,
    {
        let session = self
            .current
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or(FeedbackError::UnknownSession(session_id))?;
        if session.is_active() {
            return Err(FeedbackError::SessionActive(session_id));
        }
        if session.feedback.is_some() {
            return Err(FeedbackError::AlreadySubmitted(session_id));
        }
        let labels: BTreeSet<EmotionLabel> = labels.into_iter().collect();
        if labels.is_empty() {
            return Err(FeedbackError::EmptyLabels);
        }
        tracing::info!(session = %session_id, labels = labels.len(), "feedback recorded");
        Ok(session.feedback.insert(Feedback {
            labels,
            submitted_at: now,
        }))
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<&Session> {
        self.current.as_ref().filter(|s| s.is_active())
    }

    /// The active or most recently closed session.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The most recently closed session, if nothing is active.
    pub fn last_closed(&self) -> Option<&Session> {
        self.current.as_ref().filter(|s| !s.is_active())
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(SlidingWindow::default())
    }
}
