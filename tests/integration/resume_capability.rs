//! Integration tests for resume capability

use crate::support::{channel, executor, FaultyProvider};
use chat_history_scanner::resume::{read_checkpoint, CheckpointState, ResumeError};
use chat_history_scanner::scanner::{ScanError, ScanOptions, ScanRequest, ScanStatus};
use chat_history_scanner::ScanIdentity;
use std::path::Path;
use tempfile::TempDir;

fn request() -> ScanRequest {
    ScanRequest::new("guild-1", "general")
}

fn bounded(max_messages: u64) -> ScanRequest {
    request().with_options(ScanOptions {
        max_messages: Some(max_messages),
        ..ScanOptions::default()
    })
}

fn load(dir: &Path) -> CheckpointState {
    let identity: ScanIdentity = request().identity().unwrap();
    let path = dir.join(identity.filename());
    CheckpointState::load(&path, &identity, 5_000).unwrap().unwrap()
}

#[tokio::test]
async fn test_bounded_runs_equal_uninterrupted_scan() {
    let messages = channel(250);

    let full_dir = TempDir::new().unwrap();
    let full = executor(full_dir.path(), 40)
        .execute(&FaultyProvider::new(messages.clone()), request())
        .await
        .unwrap();
    assert_eq!(full.status, ScanStatus::Completed);

    let split_dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(messages);
    let mut runs = 0;
    let last = loop {
        runs += 1;
        assert!(runs <= 10, "bounded scan did not converge");
        let outcome = executor(split_dir.path(), 40)
            .execute(&provider, bounded(100))
            .await
            .unwrap();
        if outcome.status == ScanStatus::Completed {
            break outcome;
        }
        assert_eq!(outcome.status, ScanStatus::Paused);
        assert!(outcome.messages_this_run >= 100);
    };
    assert!(runs > 1);

    assert_eq!(last.totals, full.totals);
    let full_state = load(full_dir.path());
    let split_state = load(split_dir.path());
    assert_eq!(split_state.stats.users, full_state.stats.users);
    assert_eq!(split_state.stats.words, full_state.stats.words);
    assert_eq!(split_state.stats.word_leaders, full_state.stats.word_leaders);
    assert_eq!(split_state.stats.totals.duplicates_ignored, 0);
}

#[tokio::test]
async fn test_overlapping_page_after_resume_not_double_counted() {
    let messages = channel(120);
    let provider = FaultyProvider::new(messages.clone());

    let full_dir = TempDir::new().unwrap();
    let full = executor(full_dir.path(), 20)
        .execute(&FaultyProvider::new(messages), request())
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let paused = executor(dir.path(), 20)
        .execute(&provider, bounded(30))
        .await
        .unwrap();
    assert_eq!(paused.status, ScanStatus::Paused);

    // Roll the cursor back one page, as if the last save had been lost
    let path = paused.checkpoint_path.clone();
    let mut raw = read_checkpoint(&path).unwrap().unwrap();
    let cursor: u64 = raw["cursor_before_id"].as_str().unwrap().parse().unwrap();
    raw["cursor_before_id"] = serde_json::Value::String((cursor + 20).to_string());
    std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

    let resumed = executor(dir.path(), 20)
        .execute(&provider, request())
        .await
        .unwrap();
    assert_eq!(resumed.status, ScanStatus::Completed);
    assert_eq!(resumed.totals.scanned_messages, full.totals.scanned_messages);
    assert_eq!(resumed.totals.duplicates_ignored, 20);
}

#[tokio::test]
async fn test_checkpoint_resume_ordinal_matches_scanned() {
    let dir = TempDir::new().unwrap();
    let outcome = executor(dir.path(), 25)
        .execute(&FaultyProvider::new(channel(100)), bounded(40))
        .await
        .unwrap();

    let raw = read_checkpoint(&outcome.checkpoint_path).unwrap().unwrap();
    let scanned = raw["totals"]["scanned_messages"].as_u64().unwrap();
    assert_eq!(
        raw["resume_from_message_number"].as_u64().unwrap(),
        scanned + 1
    );
    assert_eq!(raw["completed"], serde_json::Value::Bool(false));
    assert_eq!(raw["version"].as_u64(), Some(1));
}

#[tokio::test]
async fn test_completed_identity_is_not_rescanned() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(60));

    let first = executor(dir.path(), 25)
        .execute(&provider, request())
        .await
        .unwrap();
    let calls_after_first = provider.calls();

    let second = executor(dir.path(), 25)
        .execute(&provider, request())
        .await
        .unwrap();

    assert_eq!(second.status, ScanStatus::AlreadyCompleted);
    assert_eq!(second.messages_this_run, 0);
    assert_eq!(second.totals, first.totals);
    assert_eq!(provider.calls(), calls_after_first);
    assert_ne!(second.report_path, first.report_path);
    assert!(first.report_path.exists());
    assert!(second.report_path.exists());
}

#[tokio::test]
async fn test_reset_starts_over() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(60));

    let first = executor(dir.path(), 25)
        .execute(&provider, request())
        .await
        .unwrap();

    let reset = executor(dir.path(), 25)
        .execute(
            &provider,
            request().with_options(ScanOptions {
                resume: false,
                ..ScanOptions::default()
            }),
        )
        .await
        .unwrap();

    assert_eq!(reset.status, ScanStatus::Completed);
    assert_eq!(reset.totals.scanned_messages, first.totals.scanned_messages);
    assert_eq!(reset.messages_this_run, first.totals.scanned_messages);
}

#[tokio::test]
async fn test_malformed_checkpoint_is_fatal() {
    let dir = TempDir::new().unwrap();
    let identity = request().identity().unwrap();
    let path = dir.path().join(identity.filename());
    std::fs::write(&path, "{ definitely not json").unwrap();

    let err = executor(dir.path(), 25)
        .execute(&FaultyProvider::new(channel(10)), request())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScanError::Checkpoint(ResumeError::Parse { .. })
    ));
    // The broken file is left for inspection
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "{ definitely not json"
    );
}

#[tokio::test]
async fn test_foreign_checkpoint_is_rejected() {
    let dir = TempDir::new().unwrap();
    let identity = request().identity().unwrap();
    let path = dir.path().join(identity.filename());
    std::fs::write(&path, r#"{"checkpoint_key": "[\"other\",\"chan\",\"*\",\"*\",false]"}"#).unwrap();

    let err = executor(dir.path(), 25)
        .execute(&FaultyProvider::new(channel(10)), request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScanError::Checkpoint(ResumeError::Corrupt { .. })
    ));
}
