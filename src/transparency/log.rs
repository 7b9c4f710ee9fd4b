//! Privacy-preserving transparency log.
//!
//! This module tracks and exposes statistics about monitoring activity
//! without storing any frames, faces, or per-frame emotion data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cumulative monitoring statistics.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of frames scored and recorded
    frames_processed: AtomicU64,
    /// Number of frames skipped (unavailable or no active session)
    frames_skipped: AtomicU64,
    /// Number of frames whose stress exceeded the alert threshold
    alerts_raised: AtomicU64,
    /// Number of sessions closed
    sessions_completed: AtomicU64,
    /// Number of feedback submissions accepted
    feedback_submitted: AtomicU64,
    /// When this process started counting
    process_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            feedback_submitted: AtomicU64::new(0),
            process_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        // Try to load existing stats
        if let Err(e) = log.load() {
            tracing::warn!("could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feedback_submitted(&self) {
        self.feedback_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            feedback_submitted: self.feedback_submitted.load(Ordering::Relaxed),
            process_start: self.process_start,
            uptime_secs: (Utc::now() - self.process_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Monitoring Statistics:\n\
             - Frames analysed: {}\n\
             - Frames skipped: {}\n\
             - Stress alerts: {}\n\
             - Sessions completed: {}\n\
             - Feedback submitted: {}\n\
             - Uptime: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No camera frames stored\n\
             - No face images leave the classifier\n\
             - Only emotion probabilities and derived stress retained",
            stats.frames_processed,
            stats.frames_skipped,
            stats.alerts_raised,
            stats.sessions_completed,
            stats.feedback_submitted,
            stats.uptime_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_processed: stats.frames_processed,
                frames_skipped: stats.frames_skipped,
                alerts_raised: stats.alerts_raised,
                sessions_completed: stats.sessions_completed,
                feedback_submitted: stats.feedback_submitted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_processed
                    .store(persisted.frames_processed, Ordering::Relaxed);
                self.frames_skipped
                    .store(persisted.frames_skipped, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
                self.sessions_completed
                    .store(persisted.sessions_completed, Ordering::Relaxed);
                self.feedback_submitted
                    .store(persisted.feedback_submitted, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.frames_skipped.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
        self.sessions_completed.store(0, Ordering::Relaxed);
        self.feedback_submitted.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub alerts_raised: u64,
    pub sessions_completed: u64,
    pub feedback_submitted: u64,
    pub process_start: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_processed: u64,
    frames_skipped: u64,
    alerts_raised: u64,
    sessions_completed: u64,
    feedback_submitted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
