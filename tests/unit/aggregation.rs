//! Aggregation state: counting, leaders, dedupe

use crate::support::message;
use chat_history_scanner::stats::{Classifier, ScanStats};
use chat_history_scanner::{Attachment, MessageId};

fn record(stats: &mut ScanStats, id: u64, user: &str, text: &str) -> bool {
    let classifier = Classifier::default();
    let msg = message(id, user, text);
    if !stats.mark_seen(msg.id, 100) {
        return false;
    }
    stats.record_message(&msg, &classifier.classify(&msg));
    true
}

#[test]
fn test_hello_scenario() {
    let mut stats = ScanStats::default();
    record(&mut stats, 1, "100", "hello");
    record(&mut stats, 2, "100", "hello");
    record(&mut stats, 3, "200", "hello");

    assert_eq!(stats.words["hello"], 3);
    let leader = &stats.word_leaders["hello"];
    assert_eq!(leader.user_id, "100");
    assert_eq!(leader.count, 2);
    assert_eq!(stats.totals.unique_words, 1);
    assert_eq!(stats.totals.unique_users, 2);
}

#[test]
fn test_replayed_id_is_not_double_counted() {
    let mut stats = ScanStats::default();
    assert!(record(&mut stats, 7, "1", "once"));
    let before = stats.totals.clone();

    assert!(!record(&mut stats, 7, "1", "once"));

    assert_eq!(stats.totals.scanned_messages, before.scanned_messages);
    assert_eq!(stats.words["once"], 1);
    assert_eq!(stats.totals.duplicates_ignored, 1);
}

#[test]
fn test_partition_invariant_with_media() {
    let mut stats = ScanStats::default();
    let classifier = Classifier::default();
    for id in 1..=20u64 {
        let mut msg = message(id, &(id % 3).to_string(), "some words here");
        if id % 4 == 0 {
            msg.attachments.push(Attachment {
                content_type: Some("image/gif".to_string()),
                name: None,
                url: None,
            });
        }
        assert!(stats.mark_seen(MessageId::new(id), 100));
        stats.record_message(&msg, &classifier.classify(&msg));
    }

    stats.verify_invariants().unwrap();
    for user in stats.users.values() {
        assert_eq!(user.message_count, user.text_only_count + user.media.any);
    }
    let sum: u64 = stats.users.values().map(|u| u.message_count).sum();
    assert_eq!(sum, stats.totals.scanned_messages);
    assert_eq!(stats.totals.media.animated, 5);
    assert_eq!(stats.totals.media.image, 0);
}

#[test]
fn test_mixed_channel_totals_are_consistent() {
    let classifier = Classifier::default();
    let mut stats = ScanStats::default();
    for msg in crate::support::channel(91) {
        assert!(stats.mark_seen(msg.id, 500));
        stats.record_message(&msg, &classifier.classify(&msg));
    }

    stats.verify_invariants().unwrap();
    // ids 13..=91 step 13 carry an image, 5..=83 step 13 a sticker
    assert_eq!(stats.totals.media.image, 7);
    assert_eq!(stats.totals.media.sticker, 7);
    assert_eq!(stats.totals.media.any, 14);
    assert_eq!(stats.totals.text_only_messages, 77);
    assert_eq!(stats.totals.unique_users, 7);
    let word_sum: u64 = stats.words.values().sum();
    assert_eq!(word_sum, stats.totals.total_word_uses);
    for (word, leader) in &stats.word_leaders {
        assert!(leader.count <= stats.words[word]);
    }
}
