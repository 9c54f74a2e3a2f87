//! Scan identity determinism

use chat_history_scanner::identifier::{IdentifierError, ScanIdentity, ScanRange};

fn identity(start: Option<&str>, end: Option<&str>, bots: bool) -> ScanIdentity {
    let range = ScanRange::parse(start, end).unwrap();
    ScanIdentity::new("guild 1", "general/chat", range, bots).unwrap()
}

#[test]
fn test_identical_inputs_identical_filename() {
    let a = identity(Some("2024-01-01"), Some("2024-02-01"), false);
    let b = identity(Some("2024-01-01"), Some("2024-02-01"), false);
    assert_eq!(a, b);
    assert_eq!(a.key(), b.key());
    assert_eq!(a.filename(), b.filename());
}

#[test]
fn test_each_component_changes_filename() {
    let base = identity(Some("2024-01-01"), None, false);
    assert_ne!(base.filename(), identity(Some("2024-01-01"), None, true).filename());
    assert_ne!(base.filename(), identity(Some("2024-01-02"), None, false).filename());
    assert_ne!(
        base.filename(),
        identity(Some("2024-01-01"), Some("2024-03-01"), false).filename()
    );
}

#[test]
fn test_filename_is_filesystem_safe() {
    let name = identity(None, None, false).filename();
    assert!(name.ends_with(".json"));
    assert!(name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));
}

#[test]
fn test_date_only_and_explicit_midnight_agree() {
    let a = identity(Some("2024-01-01"), None, false);
    let b = identity(Some("2024-01-01T00:00:00Z"), None, false);
    assert_eq!(a.key(), b.key());
}

#[test]
fn test_empty_ids_rejected() {
    let err = ScanIdentity::new("", "c", ScanRange::unbounded(), false).unwrap_err();
    assert!(matches!(err, IdentifierError::InvalidFormat(_)));
}

#[test]
fn test_unparseable_boundary_rejected() {
    let err = ScanRange::parse(Some("yesterday"), None).unwrap_err();
    assert!(matches!(err, IdentifierError::InvalidBoundary(_)));
}
