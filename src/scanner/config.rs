//! Scan configuration
//!
//! [`ScanConfig`] is built once and handed to the executor; nothing reads
//! the environment after that.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Messages requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Attempts per page, first try included.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 4;

/// Backoff unit; attempt `n` waits `n` units.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Pause between pages when fast mode is off.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(250);

/// Recently seen ids kept for duplicate detection.
pub const DEFAULT_DEDUPE_WINDOW: usize = 5_000;

/// Global top words in the output artifact.
pub const DEFAULT_TOP_WORDS_LIMIT: usize = 50;

/// Per-user top words in the output artifact.
pub const DEFAULT_USER_TOP_WORDS_LIMIT: usize = 15;

/// Linear backoff before retry `attempt` (1-based).
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// Dual threshold: fires after `every_messages` new messages or `every`
/// elapsed, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    /// Message-count delta
    pub every_messages: u64,
    /// Wall-clock delta
    pub every: Duration,
}

impl Cadence {
    /// Create a cadence
    pub const fn new(every_messages: u64, every: Duration) -> Self {
        Self {
            every_messages,
            every,
        }
    }

    /// Whether either threshold has been crossed
    pub fn is_due(&self, messages_since: u64, elapsed_since: Duration) -> bool {
        (self.every_messages > 0 && messages_since >= self.every_messages)
            || elapsed_since >= self.every
    }
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory holding checkpoint files
    pub checkpoint_dir: PathBuf,
    /// Directory receiving output artifacts
    pub output_dir: PathBuf,
    /// Messages per page
    pub page_size: usize,
    /// Attempts per page
    pub max_fetch_attempts: u32,
    /// Retry backoff unit
    pub retry_base_delay: Duration,
    /// Pause between pages
    pub request_delay: Duration,
    /// Skip the pause between pages
    pub fast_mode: bool,
    /// Progress callback cadence
    pub progress_cadence: Cadence,
    /// Checkpoint save cadence
    pub checkpoint_cadence: Cadence,
    /// Drop stopwords from word counts
    pub use_stopwords: bool,
    /// Global words listed in the artifact
    pub top_words_limit: usize,
    /// Per-user words listed in the artifact
    pub user_top_words_limit: usize,
    /// Size of the duplicate-detection window
    pub dedupe_window: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("scans"),
            output_dir: PathBuf::from("scans"),
            page_size: DEFAULT_PAGE_SIZE,
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            request_delay: DEFAULT_REQUEST_DELAY,
            fast_mode: false,
            progress_cadence: Cadence::new(500, Duration::from_secs(5)),
            checkpoint_cadence: Cadence::new(2_000, Duration::from_secs(30)),
            use_stopwords: true,
            top_words_limit: DEFAULT_TOP_WORDS_LIMIT,
            user_top_words_limit: DEFAULT_USER_TOP_WORDS_LIMIT,
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
        }
    }
}

impl ScanConfig {
    /// Use `dir` for both checkpoints and output artifacts
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.output_dir = dir.clone();
        self.checkpoint_dir = dir;
        self
    }

    /// Write output artifacts to `dir`
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the attempt budget and backoff unit
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_fetch_attempts = max_attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    /// Set the inter-page pause
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Enable or disable fast mode
    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    /// Set the progress cadence
    pub fn with_progress_cadence(mut self, cadence: Cadence) -> Self {
        self.progress_cadence = cadence;
        self
    }

    /// Set the checkpoint cadence
    pub fn with_checkpoint_cadence(mut self, cadence: Cadence) -> Self {
        self.checkpoint_cadence = cadence;
        self
    }

    /// Enable or disable stopword filtering
    pub fn with_stopwords(mut self, use_stopwords: bool) -> Self {
        self.use_stopwords = use_stopwords;
        self
    }

    /// Set artifact list lengths
    pub fn with_top_words(mut self, global: usize, per_user: usize) -> Self {
        self.top_words_limit = global;
        self.user_top_words_limit = per_user;
        self
    }

    /// Set the dedupe window size
    pub fn with_dedupe_window(mut self, size: usize) -> Self {
        self.dedupe_window = size.max(1);
        self
    }

    /// Effective pause between pages
    pub fn inter_page_delay(&self) -> Option<Duration> {
        if self.fast_mode || self.request_delay.is_zero() {
            None
        } else {
            Some(self.request_delay)
        }
    }

    /// Checkpoint path for a file name
    pub fn checkpoint_path(&self, filename: &str) -> PathBuf {
        self.checkpoint_dir.join(filename)
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
