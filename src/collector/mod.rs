//! Frame collection module for the Stress Sense Agent.
//!
//! This module receives per-frame emotion probabilities from the external
//! classifier. Camera capture and classification happen upstream.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{parse_line, CollectorConfig, CollectorError, ReplayCollector};
pub use types::{EmotionLabel, EmotionVector, FrameEvent, FrameInput, LabelParseError};

/// Default collector type alias
pub type Collector = ReplayCollector;
