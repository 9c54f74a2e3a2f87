//! Defensive checkpoint normalization
//!
//! Checkpoints are long-lived and human-editable, so loading never trusts
//! their shape. Every field is rebuilt with type checks: counts are clamped to
//! be non-negative, maps are rebuilt key by key, unknown fields are dropped
//! and missing fields take their defaults.

use super::state::{CheckpointSettings, CheckpointState, ResumeError, CHECKPOINT_VERSION};
use crate::identifier::ScanIdentity;
use crate::stats::{DedupeWindow, MediaCounts, ScanStats, Totals, UserStats, WordLeader};
use crate::MessageId;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Inputs that are not part of the document itself
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// Where the document was read from, used in errors
    pub source: PathBuf,
    /// Capacity of the rebuilt dedupe window
    pub dedupe_window: usize,
    /// Fallback for missing timestamps
    pub now: DateTime<Utc>,
}

impl NormalizeContext {
    /// Context for a document read from `source`
    pub fn new(source: &Path, dedupe_window: usize) -> Self {
        Self {
            source: source.to_path_buf(),
            dedupe_window,
            now: Utc::now(),
        }
    }
}

/// Rebuild a well-typed [`CheckpointState`] from an arbitrary JSON document.
///
/// # Errors
///
/// [`ResumeError::Corrupt`] if the root is not an object or the document
/// records a different identity's key.
pub fn normalize(
    raw: &Value,
    identity: &ScanIdentity,
    context: &NormalizeContext,
) -> Result<CheckpointState, ResumeError> {
    let corrupt = |reason: String| ResumeError::Corrupt {
        path: context.source.display().to_string(),
        reason,
    };

    let root = raw
        .as_object()
        .ok_or_else(|| corrupt("root is not an object".to_string()))?;

    let expected_key = identity.key();
    if let Some(stored_key) = root.get("checkpoint_key").and_then(Value::as_str) {
        if stored_key != expected_key {
            return Err(corrupt(format!(
                "belongs to scan {stored_key:?}, expected {expected_key:?}"
            )));
        }
    }

    if let Some(version) = root.get("version").and_then(Value::as_u64) {
        if version > u64::from(CHECKPOINT_VERSION) {
            warn!(
                found_version = version,
                supported_version = CHECKPOINT_VERSION,
                "Checkpoint written by a newer version, unknown fields will be dropped"
            );
        }
    }

    let totals = root
        .get("totals")
        .and_then(Value::as_object)
        .map(normalize_totals)
        .unwrap_or_default();

    let users = root
        .get("users")
        .and_then(Value::as_object)
        .map(normalize_users)
        .unwrap_or_default();

    let words = root
        .get("words_overall")
        .and_then(Value::as_object)
        .map(normalize_word_counts)
        .unwrap_or_default();

    let word_leaders = root
        .get("word_top_user")
        .and_then(Value::as_object)
        .map(|leaders| normalize_leaders(leaders, &words))
        .unwrap_or_default();

    let recent_ids = DedupeWindow::from_ids(
        root.get("dedupe_recent_ids")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(message_id),
        context.dedupe_window,
    );

    let completed = root
        .get("completed")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let stats = ScanStats {
        totals,
        users,
        words,
        word_leaders,
        recent_ids,
    };

    if let Err(violation) = stats.verify_invariants() {
        warn!(
            path = %context.source.display(),
            violation = %violation,
            "Checkpoint counters are inconsistent"
        );
    }

    let resume_from_ordinal = stats.totals.scanned_messages.saturating_add(1);
    if let Some(stored) = root.get("resume_from_message_number").and_then(Value::as_u64) {
        if stored != resume_from_ordinal {
            warn!(
                stored,
                derived = resume_from_ordinal,
                "Resume ordinal disagrees with scanned count, using derived value"
            );
        }
    }

    Ok(CheckpointState {
        version: CHECKPOINT_VERSION,
        checkpoint_key: expected_key,
        settings: CheckpointSettings::from_identity(identity),
        started_at: timestamp(root.get("started_at")).unwrap_or(context.now),
        last_updated: timestamp(root.get("last_updated")).unwrap_or(context.now),
        cursor: root.get("cursor_before_id").and_then(message_id),
        resume_from_ordinal,
        completed,
        completed_at: if completed {
            timestamp(root.get("completed_at"))
        } else {
            None
        },
        stats,
    })
}

/// Non-negative integer from any JSON number or numeric string; 0 otherwise
/// Largest counter accepted from a checkpoint; leaves headroom for increments
pub const MAX_COUNTER: u64 = i64::MAX as u64;

fn count(value: Option<&Value>) -> u64 {
    let raw = match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    f.floor() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|v| v.max(0) as u64)
            .unwrap_or(0),
        _ => 0,
    };
    raw.min(MAX_COUNTER)
}

fn text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn message_id(value: &Value) -> Option<MessageId> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(MessageId::new),
        _ => None,
    }
}

fn normalize_media(value: Option<&Value>) -> MediaCounts {
    let Some(media) = value.and_then(Value::as_object) else {
        return MediaCounts::default();
    };
    MediaCounts {
        any: count(media.get("any")),
        image: count(media.get("image")),
        animated: count(media.get("animated")),
        sticker: count(media.get("sticker")),
    }
}

fn normalize_totals(totals: &Map<String, Value>) -> Totals {
    Totals {
        scanned_messages: count(totals.get("scanned_messages")),
        text_only_messages: count(totals.get("text_only_messages")),
        media: normalize_media(totals.get("media")),
        total_word_uses: count(totals.get("total_word_uses")),
        unique_words: count(totals.get("unique_words")),
        unique_users: count(totals.get("unique_users")),
        fetched_messages: count(totals.get("fetched_messages")),
        duplicates_ignored: count(totals.get("duplicates_ignored")),
        skipped_automated: count(totals.get("skipped_automated")),
        skipped_newer_than_end: count(totals.get("skipped_newer_than_end")),
        skipped_older_than_start: count(totals.get("skipped_older_than_start")),
    }
}

fn normalize_word_counts(words: &Map<String, Value>) -> BTreeMap<String, u64> {
    words
        .iter()
        .filter(|(word, _)| !word.is_empty())
        .map(|(word, value)| (word.clone(), count(Some(value))))
        .filter(|(_, n)| *n > 0)
        .collect()
}

fn normalize_users(users: &Map<String, Value>) -> BTreeMap<String, UserStats> {
    users
        .iter()
        .filter(|(user_id, _)| !user_id.is_empty())
        .filter_map(|(user_id, value)| {
            let user = value.as_object()?;
            Some((
                user_id.clone(),
                UserStats {
                    user_id: user_id.clone(),
                    label: text(user.get("label")),
                    message_count: count(user.get("message_count")),
                    text_only_count: count(user.get("text_only_count")),
                    media: normalize_media(user.get("media")),
                    total_word_uses: count(user.get("total_word_uses")),
                    words: user
                        .get("words")
                        .and_then(Value::as_object)
                        .map(normalize_word_counts)
                        .unwrap_or_default(),
                },
            ))
        })
        .collect()
}

fn normalize_leaders(
    leaders: &Map<String, Value>,
    words: &BTreeMap<String, u64>,
) -> BTreeMap<String, WordLeader> {
    leaders
        .iter()
        .filter_map(|(word, value)| {
            let leader = value.as_object()?;
            let user_id = text(leader.get("user_id"));
            let leader_count = count(leader.get("count"));
            let global = *words.get(word)?;
            if user_id.is_empty() || leader_count == 0 || leader_count > global {
                return None;
            }
            Some((
                word.clone(),
                WordLeader {
                    user_id,
                    label: text(leader.get("label")),
                    count: leader_count,
                },
            ))
        })
        .collect()
}
