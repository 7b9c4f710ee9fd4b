//! Core functionality for the Stress Sense Agent.
//!
//! This module contains:
//! - Stress scoring for individual frames
//! - The trailing live window of recent samples
//! - Session lifecycle, feedback, and end-of-session summaries
//! - The frame-driven monitor that ties them together

pub mod monitor;
pub mod scoring;
pub mod session;
pub mod summary;
pub mod windowing;

// Re-export commonly used types
pub use monitor::{
    FrameOutcome, LiveUpdate, LiveView, Monitor, MonitorSettings, SkipReason,
    DEFAULT_ALERT_THRESHOLD,
};
pub use scoring::{dominant_emotion, round_stress, score, stress_level, Sample, StressScore};
pub use session::{
    Feedback, FeedbackError, LifecycleError, RecorderState, Session, SessionId, SessionRecorder,
    StartOutcome,
};
pub use summary::{summarize, EmotionShare, SessionReport, SessionSummary, TimelinePoint};
pub use windowing::{SlidingWindow, DEFAULT_HORIZON_SECS};
