//! Pagination driver with retry
//!
//! Fetches fixed-size pages from a [`MessageProvider`]. Transient failures are
//! retried with linearly increasing backoff up to a fixed attempt budget;
//! non-transient failures propagate immediately.

use crate::fetcher::{FetcherError, FetcherResult, MessageProvider};
use crate::scanner::config::calculate_backoff;
use crate::shutdown::SharedShutdown;
use crate::{Message, MessageId};
use std::cmp::Reverse;
use std::time::Duration;
use tracing::{debug, warn};

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// Messages, newest first
    pub messages: Vec<Message>,
    /// Attempts needed to fetch it
    pub attempts: u32,
}

impl Page {
    /// Whether the history is exhausted
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Oldest message id in the page
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.messages.iter().map(|m| m.id).min()
    }
}

/// Sort strictly newest to oldest by id, whatever order the provider used
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by_key(|m| Reverse(m.id));
}

/// Retrying page fetcher
#[derive(Debug, Clone)]
pub struct PageFetcher {
    page_size: usize,
    max_attempts: u32,
    base_delay: Duration,
    shutdown: Option<SharedShutdown>,
}

impl PageFetcher {
    /// Create a fetcher
    ///
    /// # Arguments
    /// * `page_size` - Messages requested per page
    /// * `max_attempts` - Total attempts per page, first try included
    /// * `base_delay` - Backoff unit; attempt `n` waits `n * base_delay`
    pub fn new(page_size: usize, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            page_size: page_size.max(1),
            max_attempts: max_attempts.max(1),
            base_delay,
            shutdown: None,
        }
    }

    /// Abort backoff waits when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Page size in messages
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the page before `before`, sorted newest first
    ///
    /// # Errors
    /// * Non-transient provider errors, unchanged
    /// * [`FetcherError::RetriesExhausted`] once the attempt budget is spent
    /// * [`FetcherError::Cancelled`] if shutdown interrupts a backoff wait
    pub async fn fetch_page(
        &self,
        provider: &dyn MessageProvider,
        before: Option<MessageId>,
    ) -> FetcherResult<Page> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                before = ?before.map(|id| id.to_string()),
                attempt,
                limit = self.page_size,
                "Fetching page"
            );

            let error = match provider.fetch_before(before, self.page_size).await {
                Ok(mut messages) => {
                    sort_newest_first(&mut messages);
                    debug!(count = messages.len(), attempt, "Page received");
                    return Ok(Page {
                        messages,
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                warn!(error = %error, "Non-transient fetch error, not retrying");
                return Err(error);
            }

            if attempt >= self.max_attempts {
                warn!(
                    attempts = attempt,
                    error = %error,
                    "Fetch retries exhausted"
                );
                return Err(FetcherError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let mut backoff = calculate_backoff(self.base_delay, attempt);
            if let Some(hint) = error.retry_after() {
                backoff = backoff.max(hint);
            }
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Transient fetch error, retrying after backoff"
            );

            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    return Err(FetcherError::Cancelled);
                }
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown.wait_for_shutdown() => return Err(FetcherError::Cancelled),
                }
            } else {
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
