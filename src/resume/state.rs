//! Checkpoint state persistence
//!
//! Implements atomic checkpoint writes and raw checkpoint reads. Reads return
//! an untyped JSON document; [`super::normalize`] turns it into a
//! [`CheckpointState`] so that hand-edited or older files still load.

use super::normalize::{normalize, NormalizeContext};
use crate::identifier::ScanIdentity;
use crate::stats::ScanStats;
use crate::MessageId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Current checkpoint schema version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Maximum allowed checkpoint file size (64 MB) to prevent memory exhaustion
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Scan parameters echoed into the checkpoint file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckpointSettings {
    /// Stream id
    pub stream_id: String,
    /// Channel id
    pub channel_id: String,
    /// Start boundary
    pub start: Option<DateTime<Utc>>,
    /// End boundary
    pub end: Option<DateTime<Utc>>,
    /// Whether automated accounts are counted
    pub include_bots: bool,
}

impl CheckpointSettings {
    /// Settings describing `identity`
    pub fn from_identity(identity: &ScanIdentity) -> Self {
        Self {
            stream_id: identity.stream_id().to_string(),
            channel_id: identity.channel_id().to_string(),
            start: identity.range().start(),
            end: identity.range().end(),
            include_bots: identity.include_bots(),
        }
    }
}

/// Mutable progress record of one scan identity
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckpointState {
    /// Schema version
    pub version: u32,
    /// Key of the owning [`ScanIdentity`]
    pub checkpoint_key: String,
    /// Scan parameters
    pub settings: CheckpointSettings,
    /// When the scan was first started
    pub started_at: DateTime<Utc>,
    /// Last mutation time
    pub last_updated: DateTime<Utc>,
    /// Oldest message id processed so far; the next page is fetched before it
    #[serde(rename = "cursor_before_id")]
    pub cursor: Option<MessageId>,
    /// Ordinal of the next message to count (`scanned_messages + 1`)
    #[serde(rename = "resume_from_message_number")]
    pub resume_from_ordinal: u64,
    /// Terminal flag
    pub completed: bool,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated counters
    #[serde(flatten)]
    pub stats: ScanStats,
}

impl CheckpointState {
    /// Fresh state for `identity`
    pub fn new(identity: &ScanIdentity) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            checkpoint_key: identity.key(),
            settings: CheckpointSettings::from_identity(identity),
            started_at: now,
            last_updated: now,
            cursor: None,
            resume_from_ordinal: 1,
            completed: false,
            completed_at: None,
            stats: ScanStats::default(),
        }
    }

    /// Move the cursor to the oldest id of the page just processed
    pub fn advance_cursor(&mut self, oldest: MessageId) {
        self.cursor = Some(match self.cursor {
            Some(current) => current.min(oldest),
            None => oldest,
        });
    }

    /// Re-derive `resume_from_ordinal` and bump `last_updated`
    pub fn touch(&mut self) {
        self.resume_from_ordinal = self.stats.totals.scanned_messages.saturating_add(1);
        self.last_updated = Utc::now();
    }

    /// Mark the scan as terminally completed
    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Save state with an atomic temp-file-then-rename write.
    ///
    /// The invariant `resume_from_ordinal == scanned_messages + 1` is
    /// re-established before serializing.
    pub fn save(&mut self, path: &Path) -> Result<(), ResumeError> {
        self.touch();
        write_checkpoint(path, self)
    }

    /// Read and normalize the checkpoint at `path`, `None` if absent
    pub fn load(
        path: &Path,
        identity: &ScanIdentity,
        dedupe_window: usize,
    ) -> Result<Option<Self>, ResumeError> {
        let Some(raw) = read_checkpoint(path)? else {
            return Ok(None);
        };
        let context = NormalizeContext::new(path, dedupe_window);
        let state = normalize(&raw, identity, &context)?;
        info!(
            path = %path.display(),
            scanned_messages = state.stats.totals.scanned_messages,
            completed = state.completed,
            "Checkpoint loaded"
        );
        Ok(Some(state))
    }
}

/// Read a checkpoint document.
///
/// Returns `Ok(None)` if the file does not exist. A present file that is not
/// valid JSON is a [`ResumeError::Parse`], never an empty state.
pub fn read_checkpoint(path: &Path) -> Result<Option<serde_json::Value>, ResumeError> {
    debug!(path = %path.display(), "Reading checkpoint");

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ResumeError::IoError(e.to_string())),
    };
    if metadata.len() > MAX_CHECKPOINT_FILE_SIZE {
        return Err(ResumeError::StateTooLarge {
            size: metadata.len(),
            max: MAX_CHECKPOINT_FILE_SIZE,
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))?;

    let value = serde_json::from_str(&contents).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to parse checkpoint");
        ResumeError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(Some(value))
}

/// Write a checkpoint atomically.
///
/// Uses `tempfile::NamedTempFile` in the target directory, syncs it and
/// renames it over `path`, so a crash never leaves a truncated file.
pub fn write_checkpoint(path: &Path, state: &CheckpointState) -> Result<(), ResumeError> {
    debug!(
        path = %path.display(),
        scanned_messages = state.stats.totals.scanned_messages,
        "Saving checkpoint"
    );

    let json = serde_json::to_string_pretty(state)
        .map_err(|e| ResumeError::SerializationError(e.to_string()))?;
    write_atomically(path, json.as_bytes())?;

    debug!(
        path = %path.display(),
        resume_from = state.resume_from_ordinal,
        "Checkpoint saved"
    );
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ResumeError> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir).map_err(|e| ResumeError::IoError(e.to_string()))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(bytes)
        .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

    // Fsync parent directory so the rename itself is durable
    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Errors related to checkpoint state
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Checkpoint file is not valid JSON
    #[error("checkpoint {path} is not valid JSON: {message}")]
    Parse {
        /// Checkpoint path
        path: String,
        /// Parser message
        message: String,
    },

    /// Checkpoint is valid JSON but cannot be normalized
    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt {
        /// Checkpoint path
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// State file too large
    #[error("checkpoint file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// A scan with the same identity is already running
    #[error("scan already running for {key}")]
    AlreadyRunning {
        /// Identity key
        key: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}
