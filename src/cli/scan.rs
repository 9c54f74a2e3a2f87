//! Scan and status commands

use crate::fetcher::JsonExportProvider;
use crate::scanner::config::DEFAULT_RETRY_BASE_DELAY;
use crate::scanner::{
    ProgressCallback, ProgressSnapshot, ResumeStatus, ScanConfig, ScanExecutor, ScanOptions,
    ScanOutcome, ScanRequest,
};
use crate::shutdown::SharedShutdown;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::CliError;

/// Chat History Scanner CLI
#[derive(Parser, Debug)]
#[command(name = "chat-history-scanner")]
#[command(about = "Resumable word and media statistics over a channel's full history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Directory holding checkpoint files
    #[arg(long, global = true, default_value = "scans")]
    pub checkpoint_dir: PathBuf,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan (or resume scanning) a channel export
    Scan(ScanArgs),
    /// Show checkpoint progress without scanning
    Status(StatusArgs),
}

/// Parameters that make up the scan identity
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Stream (server) id
    #[arg(long)]
    pub stream: String,

    /// Channel id
    #[arg(long)]
    pub channel: String,

    /// Oldest time to count (YYYY-MM-DD or RFC 3339 UTC)
    #[arg(long)]
    pub start: Option<String>,

    /// Newest time to count (YYYY-MM-DD or RFC 3339 UTC)
    #[arg(long)]
    pub end: Option<String>,

    /// Count messages from automated accounts
    #[arg(long, default_value_t = false)]
    pub include_bots: bool,
}

impl TargetArgs {
    fn request(&self) -> Result<ScanRequest, CliError> {
        Ok(ScanRequest::new(&self.stream, &self.channel)
            .with_range_str(self.start.as_deref(), self.end.as_deref())?
            .include_bots(self.include_bots))
    }
}

/// Arguments of `scan`
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Scan identity
    #[command(flatten)]
    pub target: TargetArgs,

    /// Channel export file (JSON array or {"messages": [...]})
    #[arg(long)]
    pub input: PathBuf,

    /// Directory for output reports (defaults to the checkpoint directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Discard the existing checkpoint and start over
    #[arg(long, default_value_t = false)]
    pub reset: bool,

    /// Pause after counting this many messages
    #[arg(long)]
    pub max_messages: Option<u64>,

    /// Pause after this many seconds
    #[arg(long)]
    pub max_seconds: Option<u64>,

    /// Skip the pause between pages
    #[arg(long, default_value_t = false)]
    pub fast: bool,

    /// Keep stopwords in word counts
    #[arg(long, default_value_t = false)]
    pub keep_stopwords: bool,

    /// Messages per page
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub page_size: u64,

    /// Attempts per page (first try included)
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: u32,

    /// Words listed in the report
    #[arg(long, default_value = "50")]
    pub top_words: usize,

    /// Words listed per user in the report
    #[arg(long, default_value = "15")]
    pub user_top_words: usize,
}

impl ScanArgs {
    fn config(&self, checkpoint_dir: &Path) -> ScanConfig {
        let mut config = ScanConfig::default()
            .with_checkpoint_dir(checkpoint_dir)
            .with_fast_mode(self.fast)
            .with_stopwords(!self.keep_stopwords)
            .with_page_size(self.page_size as usize)
            .with_retry(self.max_attempts, DEFAULT_RETRY_BASE_DELAY)
            .with_top_words(self.top_words, self.user_top_words);
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        config
    }

    fn options(&self) -> ScanOptions {
        ScanOptions {
            resume: !self.reset,
            max_messages: self.max_messages,
            max_duration: self.max_seconds.map(Duration::from_secs),
        }
    }

    /// Run the scan
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let request = self.target.request()?.with_options(self.options());
        let provider = JsonExportProvider::from_file(&self.input)?;
        info!(
            input = %self.input.display(),
            messages = provider.len(),
            "Scanning channel export"
        );

        let spinner = create_spinner(cli.output_format);
        let callback: ProgressCallback = {
            let spinner = spinner.clone();
            Arc::new(move |snapshot: &ProgressSnapshot| spinner.set_message(snapshot.describe()))
        };

        let executor = ScanExecutor::new(self.config(&cli.checkpoint_dir))
            .with_shutdown(shutdown)
            .with_progress(callback);

        let result = executor.execute(&provider, request).await;
        spinner.finish_and_clear();
        let outcome = result?;

        match cli.output_format {
            OutputFormat::Json => print_json(&outcome)?,
            OutputFormat::Human => print_outcome(&outcome),
        }
        Ok(())
    }
}

/// Arguments of `status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Scan identity
    #[command(flatten)]
    pub target: TargetArgs,
}

impl StatusArgs {
    /// Print the checkpoint status
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let request = self.target.request()?;
        let executor =
            ScanExecutor::new(ScanConfig::default().with_checkpoint_dir(cli.checkpoint_dir.clone()));
        let status = executor.status(&request)?;

        match cli.output_format {
            OutputFormat::Json => print_json(&status)?,
            OutputFormat::Human => print_status(&status),
        }
        Ok(())
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

fn create_spinner(format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("hardcoded template is valid"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Starting scan");
    spinner
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json =
        serde_json::to_string(value).map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{json}");
    Ok(())
}

fn print_outcome(outcome: &ScanOutcome) {
    let totals = &outcome.totals;
    println!("\nScan {}", outcome.status);
    println!("Checkpoint: {}", outcome.checkpoint_path.display());
    println!("Report: {}", outcome.report_path.display());
    println!(
        "Messages scanned: {} ({} this run)",
        totals.scanned_messages, outcome.messages_this_run
    );
    println!(
        "Text-only: {}  Media: {}  Users: {}  Unique words: {}",
        totals.text_only_messages, totals.media.any, totals.unique_users, totals.unique_words
    );
    if totals.duplicates_ignored > 0 {
        println!("Duplicates ignored: {}", totals.duplicates_ignored);
    }
    println!("Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());
}

fn print_status(status: &ResumeStatus) {
    println!("Checkpoint: {}", status.checkpoint_path.display());
    if !status.found {
        println!("No checkpoint found; the next scan starts fresh.");
        return;
    }
    let state = if status.completed {
        "completed"
    } else {
        "in progress"
    };
    println!("State: {state}");
    println!(
        "Cursor: {}",
        status
            .cursor
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Resume from message #{}", status.resume_from_ordinal);
    println!("Messages scanned: {}", status.totals.scanned_messages);
}
