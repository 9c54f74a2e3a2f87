//! Integration tests for the resume status query

use crate::support::{channel, config, executor, FaultyProvider};
use chat_history_scanner::resume::ScanRegistry;
use chat_history_scanner::scanner::{ScanExecutor, ScanOptions, ScanRequest};
use tempfile::TempDir;

#[tokio::test]
async fn test_status_reflects_paused_scan() {
    let dir = TempDir::new().unwrap();
    let exec = executor(dir.path(), 10);
    let request = ScanRequest::new("g", "c");

    let outcome = exec
        .execute(
            &FaultyProvider::new(channel(50)),
            request.clone().with_options(ScanOptions {
                max_messages: Some(15),
                ..ScanOptions::default()
            }),
        )
        .await
        .unwrap();

    let status = exec.status(&request).unwrap();
    assert!(status.found);
    assert!(!status.completed);
    assert_eq!(status.checkpoint_path, outcome.checkpoint_path);
    assert_eq!(status.totals, outcome.totals);
    assert_eq!(
        status.resume_from_ordinal,
        outcome.totals.scanned_messages + 1
    );
    assert_eq!(status.cursor.map(|id| id.get()), Some(31));
}

#[tokio::test]
async fn test_status_reports_completion() {
    let dir = TempDir::new().unwrap();
    let exec = executor(dir.path(), 10);
    let request = ScanRequest::new("g", "c");
    exec.execute(&FaultyProvider::new(channel(12)), request.clone())
        .await
        .unwrap();

    let status = exec.status(&request).unwrap();
    assert!(status.completed);
    assert!(status.completed_at.is_some());
}

#[test]
fn test_status_does_not_create_files_or_register() {
    let dir = TempDir::new().unwrap();
    let registry = ScanRegistry::shared();
    let exec = ScanExecutor::new(config(dir.path(), 10)).with_registry(registry.clone());
    let request = ScanRequest::new("g", "c");

    // Works even while a run holds the identity
    let _guard = registry.start(&request.identity().unwrap()).unwrap();
    let status = exec.status(&request).unwrap();

    assert!(!status.found);
    assert_eq!(status.resume_from_ordinal, 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
