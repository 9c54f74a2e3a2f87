//! Progress snapshots and cadence tracking
//!
//! The executor reports a plain [`ProgressSnapshot`] through an optional
//! callback; rendering is up to the caller (the CLI drives a spinner).

use super::config::Cadence;
use crate::MessageId;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress observer
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Point-in-time view of a running scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Messages counted overall
    pub scanned_messages: u64,
    /// Messages counted during this run
    pub messages_this_run: u64,
    /// Messages fetched overall, duplicates included
    pub fetched_messages: u64,
    /// Messages per second during this run
    pub messages_per_second: f64,
    /// Current cursor
    pub cursor: Option<MessageId>,
    /// Checkpoint file name
    pub checkpoint_file: String,
    /// Elapsed run time in seconds
    pub elapsed_seconds: f64,
    /// Whether this is the final report of the run
    pub is_final: bool,
}

impl ProgressSnapshot {
    /// One-line human summary
    pub fn describe(&self) -> String {
        let cursor = self
            .cursor
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} messages scanned ({} this run, {:.1} msg/s), cursor {}",
            self.scanned_messages, self.messages_this_run, self.messages_per_second, cursor
        )
    }
}

/// Messages per second, zero for an empty interval
pub fn throughput(messages: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        0.0
    } else {
        messages as f64 / secs
    }
}

/// Tracks when a [`Cadence`] last fired
#[derive(Debug, Clone)]
pub struct CadenceClock {
    cadence: Cadence,
    last_count: u64,
    last_at: Instant,
}

impl CadenceClock {
    /// Start tracking from `count`
    pub fn new(cadence: Cadence, count: u64) -> Self {
        Self {
            cadence,
            last_count: count,
            last_at: Instant::now(),
        }
    }

    /// Whether the cadence is due at `count`
    pub fn is_due(&self, count: u64) -> bool {
        self.cadence
            .is_due(count.saturating_sub(self.last_count), self.last_at.elapsed())
    }

    /// Record that the event fired at `count`
    pub fn reset(&mut self, count: u64) {
        self.last_count = count;
        self.last_at = Instant::now();
    }

    /// Fire if due, resetting the clock
    pub fn tick(&mut self, count: u64) -> bool {
        if self.is_due(count) {
            self.reset(count);
            true
        } else {
            false
        }
    }
}
