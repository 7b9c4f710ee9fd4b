//! Stress Sense Agent - live stress scoring from facial emotion probabilities.
//!
//! An external classifier turns each camera frame into seven emotion
//! probabilities. This library scores every frame for stress, keeps a trailing
//! window for live charting, records monitoring sessions, and summarizes them
//! when they close.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Stress Sense Agent                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────┐            │
//! │  │  Collector  │──▶│   Scoring   │──▶│  Windowing   │──▶ live    │
//! │  │ (JSON lines)│   │ (per frame) │   │ (30s trail)  │    chart   │
//! │  └─────────────┘   └─────────────┘   └──────────────┘            │
//! │                           │                                      │
//! │                           ▼                                      │
//! │                    ┌─────────────┐   ┌──────────────┐            │
//! │                    │   Session   │──▶│   Summary    │──▶ report  │
//! │                    │  Recorder   │   │  + Feedback  │            │
//! │                    └─────────────┘   └──────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use stress_sense_agent::{EmotionLabel, EmotionVector, FrameEvent, FrameOutcome, Monitor};
//!
//! let mut monitor = Monitor::default();
//! monitor.start();
//!
//! let frame = FrameEvent::now(EmotionVector::new([
//!     (EmotionLabel::Angry, 0.6),
//!     (EmotionLabel::Sad, 0.1),
//!     (EmotionLabel::Fear, 0.1),
//! ]));
//! if let FrameOutcome::Recorded(update) = monitor.process_frame(frame) {
//!     assert!(update.alert);
//! }
//!
//! let summary = monitor.stop().expect("session was active");
//! assert_eq!(summary.dominant_emotion, Some(EmotionLabel::Angry));
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{
    Collector, CollectorConfig, CollectorError, EmotionLabel, EmotionVector, FrameEvent,
    FrameInput,
};
pub use config::{Config, ConfigError};
pub use crate::core::{
    summarize, FeedbackError, FrameOutcome, LifecycleError, LiveUpdate, Monitor,
    MonitorSettings, SessionReport, SessionSummary, SlidingWindow, StartOutcome,
};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Message shown alongside a live stress alert.
pub const CALM_DOWN_MESSAGE: &str = "Calm down! Take a deep breath.";

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            STRESS SENSE AGENT - PRIVACY DECLARATION              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent estimates stress from facial expressions.            ║
║  Monitoring only runs after you grant camera consent.            ║
║                                                                  ║
║  ✓ WHAT WE KEEP:                                                 ║
║    • Seven emotion probabilities per analysed frame              ║
║    • The stress level derived from them                          ║
║    • Session summaries and the feedback you choose to give       ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Camera frames or face images                                ║
║    • Anything identifying who is in front of the camera          ║
║                                                                  ║
║  All processing is local. Session data lives in memory and is    ║
║  discarded when the next session starts, unless exported.        ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    stress-sense status                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER KEEP"));
        assert!(PRIVACY_DECLARATION.contains("Camera frames"));
    }
}
