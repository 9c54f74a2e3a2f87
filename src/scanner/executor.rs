//! Scan executor
//!
//! Runs the load / scan / finalize cycle for one [`ScanIdentity`]:
//!
//! 1. Register the identity so concurrent runs fail fast.
//! 2. Load the checkpoint (or create and save a fresh one). A completed
//!    checkpoint short-circuits to [`ScanStatus::AlreadyCompleted`].
//! 3. Walk pages newest to oldest from the saved cursor, saving on cadence.
//! 4. Save once more, then write an output artifact.
//!
//! Any error after loading triggers a best-effort save before propagating, so
//! a failed run keeps the progress it made up to its last processed page.

use super::config::ScanConfig;
use super::job::{ScanOptions, ScanOutcome, ScanRequest, ScanStatus};
use super::progress::{throughput, CadenceClock, ProgressCallback, ProgressSnapshot};
use super::status::ResumeStatus;
use super::ScanResult;
use crate::fetcher::{FetcherError, MessageProvider, Page, PageFetcher};
use crate::identifier::ScanIdentity;
use crate::output::{write_artifact, OutputArtifact, OutputError, ReportContext, RunInfo};
use crate::resume::{CheckpointState, ScanRegistry, SharedRegistry};
use crate::shutdown::{self, SharedShutdown};
use crate::stats::Classifier;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-run bookkeeping
struct RunContext<'a> {
    identity: &'a ScanIdentity,
    checkpoint_path: PathBuf,
    checkpoint_file: String,
    started: Instant,
    started_at: DateTime<Utc>,
    scanned_before: u64,
}

impl RunContext<'_> {
    fn messages_this_run(&self, state: &CheckpointState) -> u64 {
        state
            .stats
            .totals
            .scanned_messages
            .saturating_sub(self.scanned_before)
    }
}

/// What a single page did to the scan
enum PageOutcome {
    Continue,
    CrossedStart,
}

/// Orchestrates channel scans
pub struct ScanExecutor {
    config: ScanConfig,
    classifier: Classifier,
    registry: SharedRegistry,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressCallback>,
}

impl ScanExecutor {
    /// Create an executor sharing the process-wide registry and the global
    /// shutdown handle, if one is installed
    pub fn new(config: ScanConfig) -> Self {
        Self {
            classifier: Classifier::new(config.use_stopwords),
            config,
            registry: ScanRegistry::global(),
            shutdown: shutdown::get_global_shutdown(),
            progress: None,
        }
    }

    /// Share a running-scan registry with other executors
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Attach a shutdown handle for graceful pausing
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Receive progress snapshots
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Effective configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Registry used by this executor
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Checkpoint path of an identity
    pub fn checkpoint_path(&self, identity: &ScanIdentity) -> PathBuf {
        self.config.checkpoint_path(&identity.filename())
    }

    /// Scan a channel, resuming from its checkpoint
    ///
    /// # Errors
    /// * [`super::ScanError::InvalidRequest`] before anything is touched
    /// * [`super::ScanError::AlreadyRunning`] if the identity is in flight
    /// * [`super::ScanError::Checkpoint`] for unreadable or corrupt checkpoints
    /// * [`super::ScanError::Fetch`] once page retries are exhausted
    pub async fn execute(
        &self,
        provider: &dyn MessageProvider,
        request: ScanRequest,
    ) -> ScanResult<ScanOutcome> {
        let identity = request.identity()?;
        let span = info_span!(
            "scan",
            key = %identity.key(),
            checkpoint = %identity.filename()
        );
        self.run(provider, &identity, request.options)
            .instrument(span)
            .await
    }

    /// Inspect the checkpoint of a request without scanning or registering
    pub fn status(&self, request: &ScanRequest) -> ScanResult<ResumeStatus> {
        let identity = request.identity()?;
        let path = self.checkpoint_path(&identity);
        let status = match CheckpointState::load(&path, &identity, self.config.dedupe_window)? {
            Some(state) => ResumeStatus::from_state(path, &state),
            None => ResumeStatus::not_found(path),
        };
        Ok(status)
    }

    async fn run(
        &self,
        provider: &dyn MessageProvider,
        identity: &ScanIdentity,
        options: ScanOptions,
    ) -> ScanResult<ScanOutcome> {
        let _guard = self.registry.start(identity)?;

        let checkpoint_file = identity.filename();
        let checkpoint_path = self.config.checkpoint_path(&checkpoint_file);
        let mut state = self.load_state(identity, &checkpoint_path, options.resume)?;

        let run = RunContext {
            identity,
            checkpoint_path,
            checkpoint_file,
            started: Instant::now(),
            started_at: Utc::now(),
            scanned_before: state.stats.totals.scanned_messages,
        };

        if state.completed {
            info!(
                scanned_messages = state.stats.totals.scanned_messages,
                "Scan already completed, writing report from stored state"
            );
            return self.finish(ScanStatus::AlreadyCompleted, &run, &state);
        }

        info!(
            resume_from = state.resume_from_ordinal,
            cursor = ?state.cursor.map(|id| id.to_string()),
            "Starting scan"
        );

        match self.scan_pages(provider, &run, &mut state, options).await {
            Ok(status) => {
                if status == ScanStatus::Completed {
                    state.mark_completed();
                }
                if let Err(reason) = state.stats.verify_invariants() {
                    warn!(reason = %reason, "Aggregation invariant violated");
                }
                state.save(&run.checkpoint_path)?;
                self.report_progress(&run, &state, true);
                self.finish(status, &run, &state)
            }
            Err(e) => {
                warn!(error = %e, "Scan failed, saving progress before exiting");
                if let Err(save_error) = state.save(&run.checkpoint_path) {
                    warn!(error = %save_error, "Failed to save checkpoint after error");
                }
                Err(e)
            }
        }
    }

    fn load_state(
        &self,
        identity: &ScanIdentity,
        path: &Path,
        resume: bool,
    ) -> ScanResult<CheckpointState> {
        if resume {
            if let Some(state) = CheckpointState::load(path, identity, self.config.dedupe_window)? {
                return Ok(state);
            }
        } else {
            info!(path = %path.display(), "Resume disabled, starting from a fresh checkpoint");
        }

        let mut state = CheckpointState::new(identity);
        state.save(path)?;
        info!(path = %path.display(), "Created checkpoint");
        Ok(state)
    }

    async fn scan_pages(
        &self,
        provider: &dyn MessageProvider,
        run: &RunContext<'_>,
        state: &mut CheckpointState,
        options: ScanOptions,
    ) -> ScanResult<ScanStatus> {
        let fetcher = PageFetcher::new(
            self.config.page_size,
            self.config.max_fetch_attempts,
            self.config.retry_base_delay,
        )
        .with_shutdown(self.shutdown.clone());

        let scanned = state.stats.totals.scanned_messages;
        let mut progress_clock = CadenceClock::new(self.config.progress_cadence, scanned);
        let mut checkpoint_clock = CadenceClock::new(self.config.checkpoint_cadence, scanned);
        let mut pages = 0u64;

        loop {
            if let Some(max) = options.max_messages {
                if run.messages_this_run(state) >= max {
                    info!(max_messages = max, "Message limit reached, pausing");
                    return Ok(ScanStatus::Paused);
                }
            }
            if let Some(max) = options.max_duration {
                if run.started.elapsed() >= max {
                    info!(max_seconds = max.as_secs_f64(), "Time limit reached, pausing");
                    return Ok(ScanStatus::Paused);
                }
            }
            if self.shutdown_requested() {
                info!("Shutdown requested, pausing");
                return Ok(ScanStatus::Paused);
            }

            if pages > 0 {
                if let Some(delay) = self.config.inter_page_delay() {
                    tokio::time::sleep(delay).await;
                }
            }

            let page = match fetcher.fetch_page(provider, state.cursor).await {
                Ok(page) => page,
                Err(FetcherError::Cancelled) => {
                    info!("Shutdown requested during retry backoff, pausing");
                    return Ok(ScanStatus::Paused);
                }
                Err(e) => return Err(e.into()),
            };
            pages += 1;

            if page.is_empty() {
                info!(pages, "Channel history exhausted");
                return Ok(ScanStatus::Completed);
            }

            let outcome = self.process_page(run, state, &page)?;

            let scanned = state.stats.totals.scanned_messages;
            if progress_clock.tick(scanned) {
                self.report_progress(run, state, false);
            }

            if let PageOutcome::CrossedStart = outcome {
                info!(pages, "Start boundary crossed");
                return Ok(ScanStatus::Completed);
            }

            if checkpoint_clock.tick(scanned) {
                state.save(&run.checkpoint_path)?;
            }
        }
    }

    /// Fold one sorted page into the state and advance the cursor
    fn process_page(
        &self,
        run: &RunContext<'_>,
        state: &mut CheckpointState,
        page: &Page,
    ) -> ScanResult<PageOutcome> {
        let Some(oldest) = page.oldest_id() else {
            return Ok(PageOutcome::Continue);
        };
        if let Some(cursor) = state.cursor {
            if oldest >= cursor {
                return Err(FetcherError::InvalidResponse(format!(
                    "page oldest id {oldest} does not precede cursor {cursor}"
                ))
                .into());
            }
        }

        let range = run.identity.range();
        let include_bots = run.identity.include_bots();
        let window = self.config.dedupe_window;
        let mut outcome = PageOutcome::Continue;

        for message in &page.messages {
            let stats = &mut state.stats;
            stats.totals.fetched_messages += 1;

            if !stats.mark_seen(message.id, window) {
                continue;
            }
            // Newer-than-end skips and keeps walking; older-than-start ends the scan
            if range.is_newer_than_end(message.created_at) {
                stats.totals.skipped_newer_than_end += 1;
                continue;
            }
            if range.is_older_than_start(message.created_at) {
                stats.totals.skipped_older_than_start += 1;
                outcome = PageOutcome::CrossedStart;
                break;
            }
            if message.is_automated() && !include_bots {
                stats.totals.skipped_automated += 1;
                continue;
            }

            let classification = self.classifier.classify(message);
            stats.record_message(message, &classification);
        }

        state.advance_cursor(oldest);
        state.touch();
        debug!(
            page_size = page.messages.len(),
            cursor = %oldest,
            scanned_messages = state.stats.totals.scanned_messages,
            "Page processed"
        );
        Ok(outcome)
    }

    fn report_progress(&self, run: &RunContext<'_>, state: &CheckpointState, is_final: bool) {
        let elapsed = run.started.elapsed();
        let messages_this_run = run.messages_this_run(state);
        let snapshot = ProgressSnapshot {
            scanned_messages: state.stats.totals.scanned_messages,
            messages_this_run,
            fetched_messages: state.stats.totals.fetched_messages,
            messages_per_second: throughput(messages_this_run, elapsed),
            cursor: state.cursor,
            checkpoint_file: run.checkpoint_file.clone(),
            elapsed_seconds: elapsed.as_secs_f64(),
            is_final,
        };
        debug!(
            scanned_messages = snapshot.scanned_messages,
            messages_per_second = snapshot.messages_per_second,
            "Progress"
        );
        if let Some(callback) = &self.progress {
            callback(&snapshot);
        }
    }

    fn finish(
        &self,
        status: ScanStatus,
        run: &RunContext<'_>,
        state: &CheckpointState,
    ) -> ScanResult<ScanOutcome> {
        let elapsed = run.started.elapsed();
        let messages_this_run = run.messages_this_run(state);

        let artifact = OutputArtifact::build(
            state,
            ReportContext {
                status,
                identity: run.identity,
                checkpoint_file: &run.checkpoint_file,
                config: &self.config,
            },
            RunInfo {
                started_at: run.started_at,
                finished_at: Utc::now(),
                elapsed_seconds: elapsed.as_secs_f64(),
                messages_this_run,
                messages_per_second: throughput(messages_this_run, elapsed),
            },
        );
        let bytes = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;

        let stem = Path::new(&run.checkpoint_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| run.checkpoint_file.clone());
        let report_path = write_artifact(
            self.config.output_dir(),
            &stem,
            artifact.generated_at,
            &bytes,
        )?;

        info!(
            status = %status,
            scanned_messages = state.stats.totals.scanned_messages,
            messages_this_run,
            elapsed_secs = elapsed.as_secs_f64(),
            report = %report_path.display(),
            "Scan finished"
        );

        Ok(ScanOutcome {
            status,
            checkpoint_path: run.checkpoint_path.clone(),
            report_path,
            totals: state.stats.totals.clone(),
            messages_this_run,
            elapsed,
        })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
