//! Message providers and pagination
//!
//! A [`MessageProvider`] is the channel handle the orchestrator reads from.
//! It exposes one paged operation: "messages before cursor X, at most N".
//! [`pagination::PageFetcher`] wraps it with retries.

use crate::{Message, MessageId};
use async_trait::async_trait;
use std::time::Duration;

pub mod export;
pub mod pagination;

pub use export::JsonExportProvider;
pub use pagination::{sort_newest_first, Page, PageFetcher};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection-level failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Provider asked us to slow down
    #[error("rate limit exceeded")]
    RateLimited {
        /// Provider supplied wait hint
        retry_after: Option<Duration>,
    },

    /// Provider-side failure
    #[error("server error {status}: {message}")]
    ServerError {
        /// Status code
        status: u16,
        /// Error body
        message: String,
    },

    /// Missing access to the channel
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Non-retryable API error
    #[error("API error: {0}")]
    ApiError(String),

    /// Response or source could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Local source could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Provider returned a page that does not move the cursor
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Transient failures persisted past the retry budget
    #[error("giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last transient error
        last_error: String,
    },

    /// Shutdown requested while waiting to retry
    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

impl FetcherError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetcherError::NetworkError(_)
                | FetcherError::Timeout(_)
                | FetcherError::RateLimited { .. }
                | FetcherError::ServerError { .. }
        )
    }

    /// Wait hint supplied by the provider, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetcherError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Paged access to one channel's messages
#[async_trait]
pub trait MessageProvider: Send + Sync {
    /// Fetch up to `limit` messages strictly older than `before`.
    ///
    /// With `before == None` the newest messages are returned. The order of
    /// the returned page is unspecified; an empty page means the history is
    /// exhausted.
    async fn fetch_before(
        &self,
        before: Option<MessageId>,
        limit: usize,
    ) -> FetcherResult<Vec<Message>>;
}
