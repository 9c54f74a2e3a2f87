//! Scan requests and outcomes

use crate::identifier::{IdentifierError, ScanIdentity, ScanRange};
use crate::stats::Totals;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Per-invocation knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Continue an existing checkpoint; `false` starts over
    pub resume: bool,
    /// Stop after counting this many messages in this run
    pub max_messages: Option<u64>,
    /// Stop after running this long
    pub max_duration: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            resume: true,
            max_messages: None,
            max_duration: None,
        }
    }
}

/// What to scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Stream (server) id
    pub stream_id: String,
    /// Channel id
    pub channel_id: String,
    /// Time boundaries
    pub range: ScanRange,
    /// Count messages from automated accounts
    pub include_bots: bool,
    /// Run options
    pub options: ScanOptions,
}

impl ScanRequest {
    /// Unbounded scan of one channel, bots excluded
    pub fn new(stream_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            channel_id: channel_id.into(),
            range: ScanRange::unbounded(),
            include_bots: false,
            options: ScanOptions::default(),
        }
    }

    /// Set already-parsed boundaries
    pub fn with_range(mut self, range: ScanRange) -> Self {
        self.range = range;
        self
    }

    /// Parse and set boundaries from user input
    pub fn with_range_str(
        mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, IdentifierError> {
        self.range = ScanRange::parse(start, end)?;
        Ok(self)
    }

    /// Include or exclude automated accounts
    pub fn include_bots(mut self, include: bool) -> Self {
        self.include_bots = include;
        self
    }

    /// Set run options
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Derive the identity this request resumes under
    pub fn identity(&self) -> Result<ScanIdentity, IdentifierError> {
        ScanIdentity::new(
            self.stream_id.clone(),
            self.channel_id.clone(),
            self.range,
            self.include_bots,
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// History exhausted or start boundary crossed
    Completed,
    /// A run limit or shutdown stopped the run; the checkpoint resumes it
    Paused,
    /// The checkpoint was already complete; nothing was scanned
    AlreadyCompleted,
}

impl ScanStatus {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Completed => "completed",
            ScanStatus::Paused => "paused",
            ScanStatus::AlreadyCompleted => "already_completed",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Terminal status of this run
    pub status: ScanStatus,
    /// Checkpoint file of the identity
    pub checkpoint_path: PathBuf,
    /// Output artifact written by this run
    pub report_path: PathBuf,
    /// Totals after this run
    pub totals: Totals,
    /// Messages counted during this run
    pub messages_this_run: u64,
    /// Wall-clock time of this run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
