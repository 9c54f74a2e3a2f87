//! Scan identity and range boundary parsing
//!
//! A [`ScanIdentity`] fingerprints every parameter that changes what a scan
//! counts: stream, channel, optional time range and bot inclusion. Two scans
//! share a checkpoint iff their identities are equal.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum length of one sanitized component inside a checkpoint file name
const MAX_COMPONENT_LEN: usize = 40;

/// Number of hex characters of the key digest appended to file names
const HASH_LEN: usize = 12;

/// Optional `[start, end]` time range of a scan, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScanRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl ScanRange {
    /// A range with neither boundary
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a range from already-parsed boundaries
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidRange`] if `start` is after `end`.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, IdentifierError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(IdentifierError::InvalidRange(format!(
                    "start {} is after end {}",
                    s.to_rfc3339_opts(SecondsFormat::Millis, true),
                    e.to_rfc3339_opts(SecondsFormat::Millis, true)
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Parse optional textual boundaries.
    ///
    /// Accepts `YYYY-MM-DD` (start floors to 00:00:00.000, end ceils to
    /// 23:59:59.999) or an RFC 3339 timestamp in UTC. Timestamps without a
    /// zone designator are taken as UTC; explicit non-UTC offsets are rejected.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, IdentifierError> {
        let start = start
            .filter(|s| !s.trim().is_empty())
            .map(parse_start_boundary)
            .transpose()?;
        let end = end
            .filter(|s| !s.trim().is_empty())
            .map(parse_end_boundary)
            .transpose()?;
        Self::new(start, end)
    }

    /// Start boundary
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// End boundary
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Whether `ts` lies after the end boundary
    pub fn is_newer_than_end(&self, ts: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| ts > end)
    }

    /// Whether `ts` lies before the start boundary
    pub fn is_older_than_start(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| ts < start)
    }
}

/// Parse a start boundary, flooring date-only input to the start of the day.
pub fn parse_start_boundary(input: &str) -> Result<DateTime<Utc>, IdentifierError> {
    parse_boundary(input, |date| date.and_hms_milli_opt(0, 0, 0, 0))
}

/// Parse an end boundary, ceiling date-only input to the last millisecond of the day.
pub fn parse_end_boundary(input: &str) -> Result<DateTime<Utc>, IdentifierError> {
    parse_boundary(input, |date| date.and_hms_milli_opt(23, 59, 59, 999))
}

fn parse_boundary(
    input: &str,
    day_edge: impl Fn(NaiveDate) -> Option<NaiveDateTime>,
) -> Result<DateTime<Utc>, IdentifierError> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return day_edge(date)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| IdentifierError::InvalidBoundary(input.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        if dt.offset().local_minus_utc() != 0 {
            return Err(IdentifierError::InvalidBoundary(format!(
                "{input} (boundaries must be given in UTC)"
            )));
        }
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(IdentifierError::InvalidBoundary(input.to_string()))
}

/// Deterministic identity of a scan.
///
/// # Examples
///
/// ```
/// use chat_history_scanner::identifier::{ScanIdentity, ScanRange};
///
/// let a = ScanIdentity::new("guild", "general", ScanRange::unbounded(), false).unwrap();
/// let b = ScanIdentity::new("guild", "general", ScanRange::unbounded(), true).unwrap();
/// assert_ne!(a.filename(), b.filename());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanIdentity {
    stream_id: String,
    channel_id: String,
    range: ScanRange,
    include_bots: bool,
}

impl ScanIdentity {
    /// Create a new identity
    ///
    /// # Errors
    ///
    /// Returns an error if the stream or channel id is empty.
    pub fn new(
        stream_id: impl Into<String>,
        channel_id: impl Into<String>,
        range: ScanRange,
        include_bots: bool,
    ) -> Result<Self, IdentifierError> {
        let stream_id = stream_id.into().trim().to_string();
        let channel_id = channel_id.into().trim().to_string();

        if stream_id.is_empty() {
            return Err(IdentifierError::InvalidFormat(
                "stream id cannot be empty".to_string(),
            ));
        }
        if channel_id.is_empty() {
            return Err(IdentifierError::InvalidFormat(
                "channel id cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            stream_id,
            channel_id,
            range,
            include_bots,
        })
    }

    /// Stream (server) id
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Channel id
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Time range
    pub fn range(&self) -> &ScanRange {
        &self.range
    }

    /// Whether automated accounts are counted
    pub fn include_bots(&self) -> bool {
        self.include_bots
    }

    /// Stable textual key of this identity.
    ///
    /// Encoded as a JSON array so ids containing any separator character
    /// still map to distinct keys.
    pub fn key(&self) -> String {
        serde_json::json!([
            self.stream_id,
            self.channel_id,
            format_key_boundary(self.range.start),
            format_key_boundary(self.range.end),
            self.include_bots,
        ])
        .to_string()
    }

    /// Filesystem-safe checkpoint file name.
    ///
    /// Components are sanitized for readability; the trailing digest of
    /// [`key`](Self::key) keeps sanitized look-alikes apart.
    pub fn filename(&self) -> String {
        format!(
            "scan_{}_{}_{}_{}_{}.json",
            sanitize_component(&self.stream_id),
            sanitize_component(&self.channel_id),
            self.range_token(),
            if self.include_bots { "bots" } else { "nobots" },
            self.digest()
        )
    }

    fn range_token(&self) -> String {
        match (self.range.start, self.range.end) {
            (None, None) => "all".to_string(),
            (start, end) => format!(
                "{}-{}",
                format_file_boundary(start),
                format_file_boundary(end)
            ),
        }
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key().as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..HASH_LEN].to_string()
    }
}

impl fmt::Display for ScanIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn format_key_boundary(boundary: Option<DateTime<Utc>>) -> String {
    boundary
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "*".to_string())
}

fn format_file_boundary(boundary: Option<DateTime<Utc>>) -> String {
    boundary
        .map(|dt| dt.format("%Y%m%dT%H%M%S%3fZ").to_string())
        .unwrap_or_else(|| "open".to_string())
}

fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_COMPONENT_LEN)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Errors that can occur while building an identity
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid identity component
    #[error("identifier error: {0}")]
    InvalidFormat(String),

    /// Unparseable or non-UTC boundary
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    /// Start boundary after end boundary
    #[error("invalid range: {0}")]
    InvalidRange(String),
}
