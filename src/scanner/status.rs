//! Read-only checkpoint inspection

use crate::resume::CheckpointState;
use crate::stats::Totals;
use crate::MessageId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Where a scan identity stands, without scanning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeStatus {
    /// Whether a checkpoint exists
    pub found: bool,
    /// Checkpoint path, whether or not it exists
    pub checkpoint_path: PathBuf,
    /// Next page is fetched before this id
    pub cursor: Option<MessageId>,
    /// Ordinal of the next message to count
    pub resume_from_ordinal: u64,
    /// Counters so far
    pub totals: Totals,
    /// Whether the scan has completed
    pub completed: bool,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Last checkpoint update
    pub last_updated: Option<DateTime<Utc>>,
}

impl ResumeStatus {
    /// Status of an identity that has never been scanned
    pub fn not_found(checkpoint_path: PathBuf) -> Self {
        Self {
            found: false,
            checkpoint_path,
            cursor: None,
            resume_from_ordinal: 1,
            totals: Totals::default(),
            completed: false,
            completed_at: None,
            last_updated: None,
        }
    }

    /// Status described by a loaded checkpoint
    pub fn from_state(checkpoint_path: PathBuf, state: &CheckpointState) -> Self {
        Self {
            found: true,
            checkpoint_path,
            cursor: state.cursor,
            resume_from_ordinal: state.resume_from_ordinal,
            totals: state.stats.totals.clone(),
            completed: state.completed,
            completed_at: state.completed_at,
            last_updated: Some(state.last_updated),
        }
    }
}
