//! Integration tests for page fetch retries

use crate::support::{channel, config, executor, isolated, FaultyProvider, StuckProvider};
use chat_history_scanner::fetcher::{FetcherError, JsonExportProvider};
use chat_history_scanner::resume::read_checkpoint;
use chat_history_scanner::scanner::{ScanError, ScanRequest, ScanStatus};
use std::time::Duration;
use tempfile::TempDir;

fn request() -> ScanRequest {
    ScanRequest::new("guild-1", "general")
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(30))
        .failing([1, 2, 3], || FetcherError::ServerError {
            status: 502,
            message: "bad gateway".to_string(),
        });

    let outcome = executor(dir.path(), 50)
        .execute(&provider, request())
        .await
        .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    // Three failures, the page itself, then the empty page
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_exhausted_retries_fail_and_keep_progress() {
    let dir = TempDir::new().unwrap();
    let messages = channel(60);
    // Call 1 succeeds, the second page fails four times in a row
    let provider = FaultyProvider::new(messages.clone())
        .failing([2, 3, 4, 5], || FetcherError::Timeout("30s".to_string()));

    let err = executor(dir.path(), 20)
        .execute(&provider, request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScanError::Fetch(FetcherError::RetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(provider.calls(), 5);

    let identity = request().identity().unwrap();
    let path = dir.path().join(identity.filename());
    let raw = read_checkpoint(&path).unwrap().unwrap();
    assert_eq!(raw["cursor_before_id"].as_str(), Some("41"));
    assert!(raw["totals"]["scanned_messages"].as_u64().unwrap() > 0);

    // A later run picks up from the saved cursor and matches a clean scan
    let resumed = executor(dir.path(), 20)
        .execute(&FaultyProvider::new(messages.clone()), request())
        .await
        .unwrap();
    let clean_dir = TempDir::new().unwrap();
    let clean = executor(clean_dir.path(), 20)
        .execute(&FaultyProvider::new(messages), request())
        .await
        .unwrap();
    assert_eq!(resumed.status, ScanStatus::Completed);
    assert_eq!(resumed.totals, clean.totals);
}

#[tokio::test]
async fn test_non_transient_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(10))
        .failing([1], || FetcherError::PermissionDenied("missing read history".to_string()));

    let err = executor(dir.path(), 20)
        .execute(&provider, request())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScanError::Fetch(FetcherError::PermissionDenied(_))
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_hint_extends_backoff() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(5)).failing([1], || FetcherError::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    });

    let started = tokio::time::Instant::now();
    let outcome = executor(dir.path(), 20)
        .execute(&provider, request())
        .await
        .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_linearly() {
    let dir = TempDir::new().unwrap();
    let provider = FaultyProvider::new(channel(5)).failing([1, 2, 3], || {
        FetcherError::NetworkError("reset".to_string())
    });
    let executor = isolated(
        config(dir.path(), 20).with_retry(4, Duration::from_secs(1)),
    );

    let started = tokio::time::Instant::now();
    executor.execute(&provider, request()).await.unwrap();

    // 1s + 2s + 3s
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(7));
}

#[tokio::test]
async fn test_provider_ignoring_cursor_is_an_error() {
    let dir = TempDir::new().unwrap();
    let provider = StuckProvider {
        inner: JsonExportProvider::from_messages(channel(10)),
    };

    let err = executor(dir.path(), 5)
        .execute(&provider, request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScanError::Fetch(FetcherError::InvalidResponse(_))
    ));
}
