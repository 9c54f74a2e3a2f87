//! Aggregation state for a scan
//!
//! [`ScanStats`] owns every counter a scan accumulates: per-user statistics,
//! global word counts, the top contributor of each word and the bounded
//! window of recently seen message ids.
//!
//! Callers must gate [`ScanStats::record_message`] behind
//! [`ScanStats::mark_seen`]; recording a message whose id was already seen
//! counts it twice.

use super::classify::Classification;
use crate::{Message, MessageId};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::trace;

/// Media counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaCounts {
    /// Messages carrying any media
    pub any: u64,
    /// Messages with a static image
    pub image: u64,
    /// Messages with animated media
    pub animated: u64,
    /// Messages with a sticker
    pub sticker: u64,
}

impl MediaCounts {
    fn record(&mut self, classification: &Classification) {
        if !classification.is_media {
            return;
        }
        self.any += 1;
        if classification.has_image {
            self.image += 1;
        }
        if classification.has_animated {
            self.animated += 1;
        }
        if classification.has_sticker {
            self.sticker += 1;
        }
    }
}

/// Statistics of one user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    /// User id
    pub user_id: String,
    /// Most recent display label
    pub label: String,
    /// Messages counted for this user
    pub message_count: u64,
    /// Messages without media
    pub text_only_count: u64,
    /// Media counters
    pub media: MediaCounts,
    /// Total word tokens
    pub total_word_uses: u64,
    /// Per-word counts
    pub words: BTreeMap<String, u64>,
}

impl UserStats {
    /// Empty statistics for a user
    pub fn new(user_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Aggregate counters of a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Totals {
    /// Messages counted into statistics
    pub scanned_messages: u64,
    /// Counted messages without media
    pub text_only_messages: u64,
    /// Media counters
    pub media: MediaCounts,
    /// Total word tokens
    pub total_word_uses: u64,
    /// Distinct words seen
    pub unique_words: u64,
    /// Distinct users counted
    pub unique_users: u64,
    /// Messages returned by the provider, duplicates included
    pub fetched_messages: u64,
    /// Messages dropped because their id was already seen
    pub duplicates_ignored: u64,
    /// Messages from automated accounts that were not counted
    pub skipped_automated: u64,
    /// Messages newer than the end boundary
    pub skipped_newer_than_end: u64,
    /// Messages older than the start boundary
    pub skipped_older_than_start: u64,
}

/// Top contributor of one word
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordLeader {
    /// User id
    pub user_id: String,
    /// User label
    pub label: String,
    /// The user's count of the word
    pub count: u64,
}

/// Bounded, insertion-ordered set of recently seen message ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeWindow {
    order: VecDeque<MessageId>,
    members: HashSet<MessageId>,
}

impl DedupeWindow {
    /// Build a window from ids in oldest-inserted-first order, keeping the newest `capacity`
    pub fn from_ids(ids: impl IntoIterator<Item = MessageId>, capacity: usize) -> Self {
        let mut window = Self::default();
        for id in ids {
            window.insert(id, capacity);
        }
        window
    }

    /// Insert `id`, returning `false` if it was already present.
    ///
    /// Evicts the oldest ids once the window exceeds `capacity`.
    pub fn insert(&mut self, id: MessageId, capacity: usize) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > capacity.max(1) {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    /// Whether `id` is in the window
    pub fn contains(&self, id: MessageId) -> bool {
        self.members.contains(&id)
    }

    /// Number of ids held
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MessageId> {
        self.order.iter()
    }
}

impl Serialize for DedupeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.order.iter())
    }
}

/// Order user ids numerically when both are decimal, lexically otherwise
pub fn compare_user_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// All counters accumulated by a scan
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ScanStats {
    /// Aggregate counters
    pub totals: Totals,
    /// Per-user statistics keyed by user id
    pub users: BTreeMap<String, UserStats>,
    /// Global per-word counts
    #[serde(rename = "words_overall")]
    pub words: BTreeMap<String, u64>,
    /// Top contributor per word
    #[serde(rename = "word_top_user")]
    pub word_leaders: BTreeMap<String, WordLeader>,
    /// Recently seen message ids
    #[serde(rename = "dedupe_recent_ids")]
    pub recent_ids: DedupeWindow,
}

impl ScanStats {
    /// Gate for [`record_message`](Self::record_message): returns `false`
    /// for an id already in the window and counts the duplicate.
    pub fn mark_seen(&mut self, id: MessageId, window_size: usize) -> bool {
        let fresh = self.recent_ids.insert(id, window_size);
        if !fresh {
            self.totals.duplicates_ignored += 1;
            trace!(message_id = %id, "Duplicate message ignored");
        }
        fresh
    }

    /// Fold one classified message into user and global counters
    pub fn record_message(&mut self, message: &Message, classification: &Classification) {
        let author = &message.author;

        let is_new_user = !self.users.contains_key(&author.id);
        let user = self
            .users
            .entry(author.id.clone())
            .or_insert_with(|| UserStats::new(author.id.clone(), author.label.clone()));
        if is_new_user {
            self.totals.unique_users += 1;
        }
        if user.label.is_empty() && !author.label.is_empty() {
            user.label = author.label.clone();
        }

        user.message_count += 1;
        self.totals.scanned_messages += 1;

        if classification.is_media {
            user.media.record(classification);
            self.totals.media.record(classification);
            return;
        }

        user.text_only_count += 1;
        self.totals.text_only_messages += 1;

        for word in &classification.words {
            let user_count = {
                let count = user.words.entry(word.clone()).or_insert(0);
                *count += 1;
                *count
            };
            user.total_word_uses += 1;
            self.totals.total_word_uses += 1;

            let global = self.words.entry(word.clone()).or_insert(0);
            if *global == 0 {
                self.totals.unique_words += 1;
            }
            *global += 1;

            update_leader(
                &mut self.word_leaders,
                word,
                &user.user_id,
                &user.label,
                user_count,
            );
        }
    }

    /// Check the partition and sum invariants, describing the first violation
    pub fn verify_invariants(&self) -> Result<(), String> {
        let mut sum = 0u64;
        for user in self.users.values() {
            if user.message_count != user.text_only_count.saturating_add(user.media.any) {
                return Err(format!(
                    "user {}: message_count {} != text_only {} + media {}",
                    user.user_id, user.message_count, user.text_only_count, user.media.any
                ));
            }
            sum = sum.saturating_add(user.message_count);
        }
        if sum != self.totals.scanned_messages {
            return Err(format!(
                "sum of user message counts {sum} != scanned_messages {}",
                self.totals.scanned_messages
            ));
        }
        for (word, leader) in &self.word_leaders {
            match self.words.get(word) {
                Some(count) if *count >= leader.count => {}
                _ => return Err(format!("word leader for {word:?} exceeds global count")),
            }
        }
        Ok(())
    }
}

fn update_leader(
    leaders: &mut BTreeMap<String, WordLeader>,
    word: &str,
    user_id: &str,
    label: &str,
    user_count: u64,
) {
    match leaders.get_mut(word) {
        Some(leader) if leader.user_id == user_id => {
            leader.count = user_count;
            leader.label = label.to_string();
        }
        Some(leader) => {
            let takes_over = user_count > leader.count
                || (user_count == leader.count
                    && compare_user_ids(user_id, &leader.user_id) == Ordering::Less);
            if takes_over {
                *leader = WordLeader {
                    user_id: user_id.to_string(),
                    label: label.to_string(),
                    count: user_count,
                };
            }
        }
        None => {
            leaders.insert(
                word.to_string(),
                WordLeader {
                    user_id: user_id.to_string(),
                    label: label.to_string(),
                    count: user_count,
                },
            );
        }
    }
}
