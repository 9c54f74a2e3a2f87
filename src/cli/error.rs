//! CLI error types and conversions

use crate::fetcher::FetcherError;
use crate::identifier::IdentifierError;
use crate::scanner::ScanError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Identity or range error
    #[error("identifier error: {0}")]
    IdentifierError(#[from] IdentifierError),

    /// Export could not be loaded
    #[error("input error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Scan error
    #[error("{0}")]
    ScanError(#[from] ScanError),

    /// Result could not be printed
    #[error("serialization error: {0}")]
    SerializationError(String),
}
