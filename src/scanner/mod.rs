//! Scan orchestration
//!
//! [`ScanExecutor`] drives one channel scan: it loads or creates the
//! checkpoint, walks pages newest to oldest, folds each message into the
//! aggregation state, saves on cadence and writes an output artifact at the
//! end of every successful run.

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;
pub mod status;

pub use config::{Cadence, ScanConfig};
pub use executor::ScanExecutor;
pub use job::{ScanOptions, ScanOutcome, ScanRequest, ScanStatus};
pub use progress::{ProgressCallback, ProgressSnapshot};
pub use status::ResumeStatus;

use crate::fetcher::FetcherError;
use crate::identifier::IdentifierError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// Scan errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Invalid identity or range; nothing was touched
    #[error("invalid scan parameters: {0}")]
    InvalidRequest(#[from] IdentifierError),

    /// Another run of the same identity is in flight
    #[error("a scan is already running for {key}")]
    AlreadyRunning {
        /// Identity key
        key: String,
    },

    /// Page fetch failed after retries
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetcherError),

    /// Checkpoint could not be read or written
    #[error("checkpoint error: {0}")]
    Checkpoint(ResumeError),

    /// Output artifact could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

impl From<ResumeError> for ScanError {
    fn from(error: ResumeError) -> Self {
        match error {
            ResumeError::AlreadyRunning { key } => ScanError::AlreadyRunning { key },
            other => ScanError::Checkpoint(other),
        }
    }
}

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;
