//! Trailing time window over recent samples.
//!
//! The window backs the live stress chart. It is bounded in time span, not in
//! count: after every push, samples older than the horizon (measured from the
//! newest sample) are evicted from the front.

use crate::core::scoring::Sample;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Default trailing horizon, in seconds.
pub const DEFAULT_HORIZON_SECS: u64 = 30;

/// Time-bounded, time-ordered buffer of samples.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    /// Maximum span between newest and oldest retained sample
    horizon: Duration,
    /// Samples, oldest first
    samples: VecDeque<Sample>,
}

impl SlidingWindow {
    /// Create an empty window with the given horizon.
    pub fn new(horizon_secs: u64) -> Self {
        Self::with_horizon(Duration::seconds(horizon_secs as i64))
    }

    /// Create an empty window with an arbitrary horizon.
    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            horizon,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and evict everything outside the horizon.
    ///
    /// Returns the stress values now in the window, oldest first. A sample
    /// older than the current newest one is moved up to the newest timestamp
    /// so the buffer stays ordered.
    pub fn push(&mut self, mut sample: Sample) -> Vec<f64> {
        if let Some(newest) = self.newest_timestamp() {
            if sample.timestamp < newest {
                sample.timestamp = newest;
            }
        }
        self.samples.push_back(sample);
        self.evict();
        self.current()
    }

    /// Stress values in the window, oldest first.
    pub fn current(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.stress).collect()
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Timestamp of the newest sample.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Span between the oldest and newest retained samples.
    pub fn span(&self) -> Duration {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp - oldest.timestamp,
            _ => Duration::zero(),
        }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn evict(&mut self) {
        let Some(newest) = self.newest_timestamp() else {
            return;
        };
        while let Some(oldest) = self.samples.front() {
            if newest - oldest.timestamp > self.horizon {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZON_SECS)
    }
}
