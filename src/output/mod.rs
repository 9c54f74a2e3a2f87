//! Output artifacts
//!
//! Each successful invocation writes one immutable JSON report next to (but
//! separate from) the checkpoint. Reports are never overwritten; repeated runs
//! accumulate timestamped snapshots.

pub mod path;
pub mod report;

pub use path::{artifact_file_name, write_artifact};
pub use report::{OutputArtifact, ReportContext, RunInfo, REPORT_VERSION};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// No free artifact name was found
    #[error("could not allocate a unique artifact name in {0}")]
    NameExhausted(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
