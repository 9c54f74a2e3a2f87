//! Output artifact assembly

use crate::identifier::ScanIdentity;
use crate::resume::CheckpointState;
use crate::scanner::{ScanConfig, ScanStatus};
use crate::stats::{compare_user_ids, MediaCounts, Totals, UserStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Artifact schema version
pub const REPORT_VERSION: u32 = 1;

/// Timing of the run that produced an artifact
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunInfo {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Wall-clock seconds
    pub elapsed_seconds: f64,
    /// Messages counted in this run
    pub messages_this_run: u64,
    /// Throughput of this run
    pub messages_per_second: f64,
}

/// Inputs besides the checkpoint state
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    /// How the run ended
    pub status: ScanStatus,
    /// Identity that was scanned
    pub identity: &'a ScanIdentity,
    /// Checkpoint file name
    pub checkpoint_file: &'a str,
    /// Effective configuration
    pub config: &'a ScanConfig,
}

/// Scan parameters and effective configuration
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportSettings {
    /// Stream id
    pub stream_id: String,
    /// Channel id
    pub channel_id: String,
    /// Start boundary
    pub start: Option<DateTime<Utc>>,
    /// End boundary
    pub end: Option<DateTime<Utc>>,
    /// Automated accounts counted
    pub include_bots: bool,
    /// Stopwords dropped
    pub use_stopwords: bool,
    /// Inter-page delay disabled
    pub fast_mode: bool,
    /// Messages per page
    pub page_size: usize,
    /// Global word list length
    pub top_words_limit: usize,
    /// Per-user word list length
    pub user_top_words_limit: usize,
    /// Dedupe window size
    pub dedupe_window: usize,
}

/// One entry of the global word list
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopWord {
    /// Word
    pub word: String,
    /// Global count
    pub count: u64,
    /// Heaviest user of the word
    pub top_user: Option<TopUser>,
}

/// Attributed contributor of a word
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopUser {
    /// User id
    pub user_id: String,
    /// Label
    pub label: String,
    /// The user's count
    pub count: u64,
}

/// One entry of the message-count ranking
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedUser {
    /// 1-based rank
    pub rank: usize,
    /// User id
    pub user_id: String,
    /// Label
    pub label: String,
    /// Messages counted
    pub message_count: u64,
}

/// Per-user counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserCounts {
    /// Messages counted
    pub message_count: u64,
    /// Messages without media
    pub text_only_count: u64,
    /// Media counters
    pub media: MediaCounts,
    /// Word tokens
    pub total_word_uses: u64,
}

/// A word with a count
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WordCount {
    /// Word
    pub word: String,
    /// Count
    pub count: u64,
}

/// Per-user breakdown
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserReport {
    /// User id
    pub user_id: String,
    /// Label
    pub label: String,
    /// Counters
    pub counts: UserCounts,
    /// Distinct words used
    pub unique_words: usize,
    /// Most used words
    pub top_words: Vec<WordCount>,
}

/// Immutable snapshot written at the end of an invocation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutputArtifact {
    /// Schema version
    pub version: u32,
    /// Creation time
    pub generated_at: DateTime<Utc>,
    /// How the run ended
    pub outcome: ScanStatus,
    /// Identity key
    pub checkpoint_key: String,
    /// Checkpoint file name
    pub checkpoint_file: String,
    /// Parameters and configuration
    pub settings: ReportSettings,
    /// Run timing
    pub run: RunInfo,
    /// Aggregate counters
    pub totals: Totals,
    /// Most used words overall
    pub top_words: Vec<TopWord>,
    /// Users ranked by message count
    pub users_by_messages: Vec<RankedUser>,
    /// Per-user breakdown, same order as the ranking
    pub users: Vec<UserReport>,
}

impl OutputArtifact {
    /// Assemble an artifact from the final state of a run
    pub fn build(state: &CheckpointState, context: ReportContext<'_>, run: RunInfo) -> Self {
        let config = context.config;
        let identity = context.identity;
        let stats = &state.stats;

        let top_words = top_counts(&stats.words, config.top_words_limit)
            .into_iter()
            .map(|entry| TopWord {
                top_user: stats.word_leaders.get(&entry.word).map(|leader| TopUser {
                    user_id: leader.user_id.clone(),
                    label: leader.label.clone(),
                    count: leader.count,
                }),
                word: entry.word,
                count: entry.count,
            })
            .collect();

        let ranked = rank_users(&stats.users);

        let users_by_messages = ranked
            .iter()
            .enumerate()
            .map(|(i, user)| RankedUser {
                rank: i + 1,
                user_id: user.user_id.clone(),
                label: user.label.clone(),
                message_count: user.message_count,
            })
            .collect();

        let users = ranked
            .iter()
            .map(|user| UserReport {
                user_id: user.user_id.clone(),
                label: user.label.clone(),
                counts: UserCounts {
                    message_count: user.message_count,
                    text_only_count: user.text_only_count,
                    media: user.media,
                    total_word_uses: user.total_word_uses,
                },
                unique_words: user.words.len(),
                top_words: top_counts(&user.words, config.user_top_words_limit),
            })
            .collect();

        Self {
            version: REPORT_VERSION,
            generated_at: Utc::now(),
            outcome: context.status,
            checkpoint_key: identity.key(),
            checkpoint_file: context.checkpoint_file.to_string(),
            settings: ReportSettings {
                stream_id: identity.stream_id().to_string(),
                channel_id: identity.channel_id().to_string(),
                start: identity.range().start(),
                end: identity.range().end(),
                include_bots: identity.include_bots(),
                use_stopwords: config.use_stopwords,
                fast_mode: config.fast_mode,
                page_size: config.page_size,
                top_words_limit: config.top_words_limit,
                user_top_words_limit: config.user_top_words_limit,
                dedupe_window: config.dedupe_window,
            },
            run,
            totals: stats.totals.clone(),
            top_words,
            users_by_messages,
            users,
        }
    }
}

/// Highest counts first, ties by word
fn top_counts(words: &BTreeMap<String, u64>, limit: usize) -> Vec<WordCount> {
    let mut entries: Vec<(&String, &u64)> = words.iter().filter(|(_, c)| **c > 0).collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(limit)
        .map(|(word, count)| WordCount {
            word: word.clone(),
            count: *count,
        })
        .collect()
}

/// Users by message count, ties by user id
fn rank_users(users: &BTreeMap<String, UserStats>) -> Vec<&UserStats> {
    let mut ranked: Vec<&UserStats> = users.values().collect();
    ranked.sort_by(|a, b| {
        Reverse(a.message_count)
            .cmp(&Reverse(b.message_count))
            .then_with(|| compare_user_ids(&a.user_id, &b.user_id))
    });
    ranked
}
