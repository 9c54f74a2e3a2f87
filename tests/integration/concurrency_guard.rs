//! Integration tests for the one-run-per-identity guard

use crate::support::{channel, config, FaultyProvider};
use chat_history_scanner::resume::ScanRegistry;
use chat_history_scanner::scanner::{ScanError, ScanExecutor, ScanRequest, ScanStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_second_run_of_same_identity_fails_fast() {
    let dir = TempDir::new().unwrap();
    let registry = ScanRegistry::shared();
    let executor =
        ScanExecutor::new(config(dir.path(), 10)).with_registry(registry.clone());
    let request = ScanRequest::new("g", "c");
    let provider = FaultyProvider::new(channel(20));

    let guard = registry.start(&request.identity().unwrap()).unwrap();

    let err = executor
        .execute(&provider, request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::AlreadyRunning { .. }));
    assert_eq!(provider.calls(), 0);
    // Rejected before any checkpoint was created
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    drop(guard);
    let outcome = executor.execute(&provider, request).await.unwrap();
    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(registry.running_count(), 0);
}

#[tokio::test]
async fn test_different_identity_runs_alongside() {
    let dir = TempDir::new().unwrap();
    let registry = ScanRegistry::shared();
    let executor =
        ScanExecutor::new(config(dir.path(), 10)).with_registry(registry.clone());

    let _guard = registry
        .start(&ScanRequest::new("g", "c").identity().unwrap())
        .unwrap();

    let outcome = executor
        .execute(
            &FaultyProvider::new(channel(20)),
            ScanRequest::new("g", "c").include_bots(true),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(registry.running_count(), 1);
}

#[tokio::test]
async fn test_guard_released_after_failure() {
    let dir = TempDir::new().unwrap();
    let registry = ScanRegistry::shared();
    let executor =
        ScanExecutor::new(config(dir.path(), 10)).with_registry(registry.clone());
    let request = ScanRequest::new("g", "c");

    let failing = FaultyProvider::new(channel(20)).failing([1], || {
        chat_history_scanner::fetcher::FetcherError::ApiError("unknown channel".to_string())
    });
    assert!(executor.execute(&failing, request.clone()).await.is_err());
    assert!(!registry.is_running(&request.identity().unwrap()));

    let outcome = executor
        .execute(&FaultyProvider::new(channel(20)), request)
        .await
        .unwrap();
    assert_eq!(outcome.status, ScanStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_runs_one_wins() {
    let dir = TempDir::new().unwrap();
    let registry = ScanRegistry::shared();
    // The inter-page delay makes the first run yield while holding its guard
    let slow = config(dir.path(), 5)
        .with_fast_mode(false)
        .with_request_delay(Duration::from_millis(5));
    let first = ScanExecutor::new(slow.clone()).with_registry(registry.clone());
    let second = ScanExecutor::new(slow).with_registry(registry.clone());
    let provider = FaultyProvider::new(channel(50));

    let (a, b) = tokio::join!(
        first.execute(&provider, ScanRequest::new("g", "c")),
        second.execute(&provider, ScanRequest::new("g", "c")),
    );

    let conflicts = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(ScanError::AlreadyRunning { .. })))
        .count();
    assert_eq!(conflicts, 1);
    assert!(a.is_ok() || b.is_ok());
}

#[tokio::test]
async fn test_default_executors_share_process_registry() {
    let dir = TempDir::new().unwrap();
    let slow = config(dir.path(), 5)
        .with_fast_mode(false)
        .with_request_delay(Duration::from_millis(5));
    // No registry injected: both fall back to the process-wide one
    let first = ScanExecutor::new(slow.clone());
    let second = ScanExecutor::new(slow);
    assert!(Arc::ptr_eq(first.registry(), &ScanRegistry::global()));
    let provider = FaultyProvider::new(channel(50));
    let request = ScanRequest::new("guild-shared-registry", "general");

    let (a, b) = tokio::join!(
        first.execute(&provider, request.clone()),
        second.execute(&provider, request.clone()),
    );

    let conflicts = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(ScanError::AlreadyRunning { .. })))
        .count();
    assert_eq!(conflicts, 1);
    assert!(!ScanRegistry::global().is_running(&request.identity().unwrap()));
}
