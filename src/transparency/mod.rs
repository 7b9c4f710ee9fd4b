//! Transparency module for the Stress Sense Agent.
//!
//! This module tracks and exposes what the agent has processed, so users can
//! see that only derived emotion statistics are retained.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
