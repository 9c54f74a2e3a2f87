//! # Chat History Scanner Library
//!
//! A resumable full-history scanner for chat channels. It walks every message
//! of a channel from newest to oldest, computes word-frequency and media-usage
//! statistics per user and in aggregate, and persists incremental checkpoints
//! so that an interrupted or time-bounded scan picks up exactly where it left
//! off.
//!
//! ## Features
//!
//! - **Resume Capability**: Atomic checkpoint files keyed by a deterministic scan identity
//! - **No Double Counting**: A bounded window of recently seen message ids guards resumed runs
//! - **Range Filters**: Optional start/end boundaries with date-only shorthands
//! - **Retry**: Transient page fetch failures are retried with linear backoff
//! - **Reports**: Every successful run writes an immutable, timestamped output artifact
//!
//! ## Quick Start
//!
//! ```no_run
//! use chat_history_scanner::fetcher::export::JsonExportProvider;
//! use chat_history_scanner::scanner::{ScanConfig, ScanExecutor, ScanRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = JsonExportProvider::from_file("general.json")?;
//! let executor = ScanExecutor::new(ScanConfig::default().with_checkpoint_dir(".scans"));
//!
//! let request = ScanRequest::new("guild-1", "general");
//! let outcome = executor.execute(&provider, request).await?;
//! println!("scanned {} messages", outcome.totals.scanned_messages);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - Scan identity, range boundaries and checkpoint file names
//! - [`stats`] - Message classification and aggregation state
//! - [`resume`] - Checkpoint persistence, normalization and the running-scan registry
//! - [`fetcher`] - Message providers and the retrying pagination driver
//! - [`scanner`] - Scan orchestration, cadence and resume status queries
//! - [`output`] - Immutable output artifacts

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Message providers and pagination
pub mod fetcher;

/// Scan identity and range parsing
pub mod identifier;

/// Output artifacts
pub mod output;

/// Checkpoint persistence and the running-scan registry
pub mod resume;

/// Scan orchestration
pub mod scanner;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Classification and aggregation
pub mod stats;

pub use identifier::{ScanIdentity, ScanRange};

/// Time-ordered message identifier.
///
/// Ids grow monotonically with creation time, so ordering ids orders
/// messages. Serialized as a decimal string to stay exact for 64-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(Self(n)),
            NumberOrText::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s,
    })
}

/// Providers hand collections over either as arrays or as id-keyed maps.
/// Both shapes end up as one ordered `Vec`; maps are ordered by key.
#[derive(Deserialize)]
#[serde(untagged)]
enum SequenceOrMap<T> {
    Sequence(Vec<T>),
    Map(BTreeMap<String, T>),
}

fn sequence_or_map<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(
        match Option::<SequenceOrMap<T>>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(SequenceOrMap::Sequence(items)) => items,
            Some(SequenceOrMap::Map(items)) => items.into_values().collect(),
        },
    )
}

/// Message author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    /// Stable user id
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    /// Automated (bot) account flag
    #[serde(default, alias = "isBot")]
    pub bot: bool,
    /// Display label at the time of the message
    #[serde(default, alias = "username", alias = "tag")]
    pub label: String,
}

/// File attached to a message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type reported by the provider
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    /// Original file name
    #[serde(default, alias = "filename")]
    pub name: Option<String>,
    /// Download URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Sticker attached to a message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sticker {
    /// Sticker id
    #[serde(default)]
    pub id: Option<String>,
    /// Sticker name
    #[serde(default)]
    pub name: Option<String>,
}

/// Media reference inside an embed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedMedia {
    /// Media URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Rich embed attached to a message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Embed {
    /// Link the embed was generated from
    #[serde(default)]
    pub url: Option<String>,
    /// Embedded image
    #[serde(default)]
    pub image: Option<EmbedMedia>,
    /// Embedded thumbnail
    #[serde(default)]
    pub thumbnail: Option<EmbedMedia>,
    /// Embedded video
    #[serde(default)]
    pub video: Option<EmbedMedia>,
}

impl Embed {
    /// Whether the embed renders any visual media
    pub fn has_media(&self) -> bool {
        self.image.is_some() || self.thumbnail.is_some() || self.video.is_some()
    }
}

/// One message as returned by a provider page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Time-ordered id
    pub id: MessageId,
    /// Author
    pub author: Author,
    /// Raw text content
    #[serde(default)]
    pub content: String,
    /// Attachments
    #[serde(default, deserialize_with = "sequence_or_map")]
    pub attachments: Vec<Attachment>,
    /// Stickers
    #[serde(default, deserialize_with = "sequence_or_map")]
    pub stickers: Vec<Sticker>,
    /// Embeds
    #[serde(default, deserialize_with = "sequence_or_map")]
    pub embeds: Vec<Embed>,
    /// Creation time
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creation time in Unix milliseconds
    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Whether the author is an automated account
    pub fn is_automated(&self) -> bool {
        self.author.bot
    }
}
