//! Integration tests for start/end boundary handling

use crate::support::{channel, executor, message, time_of, FaultyProvider};
use chat_history_scanner::identifier::ScanRange;
use chat_history_scanner::resume::CheckpointState;
use chat_history_scanner::scanner::{ScanError, ScanRequest, ScanStatus};
use tempfile::TempDir;

#[tokio::test]
async fn test_newer_than_end_is_skipped_and_scan_continues() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(vec![
        message(1, "a", "first"),
        message(2, "b", "second"),
        message(3, "a", "third"),
    ]);
    let range = ScanRange::new(None, Some(time_of(2))).unwrap();

    let outcome = executor(dir.path(), 100)
        .execute(&provider, ScanRequest::new("g", "c").with_range(range))
        .await
        .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.totals.scanned_messages, 2);
    assert_eq!(outcome.totals.skipped_newer_than_end, 1);
    assert_eq!(outcome.totals.skipped_older_than_start, 0);
    assert_eq!(outcome.totals.fetched_messages, 3);
}

#[tokio::test]
async fn test_older_than_start_stops_the_scan() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(
        (1..=5)
            .map(|id| message(id, "a", &format!("word{id}")))
            .collect(),
    );
    let range = ScanRange::new(Some(time_of(3)), None).unwrap();
    let request = ScanRequest::new("g", "c").with_range(range);

    let outcome = executor(dir.path(), 2)
        .execute(&provider, request.clone())
        .await
        .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.totals.scanned_messages, 3);
    assert_eq!(outcome.totals.skipped_older_than_start, 1);
    // Pages [5,4] and [3,2]; message 1 is never requested
    assert_eq!(provider.calls(), 2);

    let identity = request.identity().unwrap();
    let state = CheckpointState::load(&outcome.checkpoint_path, &identity, 100)
        .unwrap()
        .unwrap();
    assert!(state.completed);
    assert!(!state.stats.words.contains_key("word2"));
    assert!(!state.stats.words.contains_key("word1"));
    assert!(state.stats.words.contains_key("word3"));
}

#[tokio::test]
async fn test_date_only_range_covers_whole_days() {
    let dir = TempDir::new().unwrap();
    // Message n is created n minutes after 2024-01-01T00:00Z
    let provider = FaultyProvider::new(channel(30));
    let request = ScanRequest::new("g", "c")
        .include_bots(true)
        .with_range_str(Some("2024-01-01"), Some("2024-01-01"))
        .unwrap();

    let outcome = executor(dir.path(), 7)
        .execute(&provider, request)
        .await
        .unwrap();

    assert_eq!(outcome.totals.scanned_messages, 30);
    assert_eq!(outcome.totals.skipped_newer_than_end, 0);
}

#[tokio::test]
async fn test_inverted_range_rejected_before_any_file_is_written() {
    let dir = TempDir::new().unwrap();
    let err = ScanRequest::new("g", "c")
        .with_range_str(Some("2024-02-01"), Some("2024-01-01"))
        .unwrap_err();
    assert!(err.to_string().contains("invalid range"));

    let non_utc =
        ScanRequest::new("g", "c").with_range_str(Some("2024-01-01T00:00:00+02:00"), None);
    assert!(non_utc.is_err());

    let exec = executor(dir.path(), 10);
    let empty = ScanRequest::new("", "c");
    let err = exec
        .execute(&FaultyProvider::new(channel(3)), empty)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidRequest(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
