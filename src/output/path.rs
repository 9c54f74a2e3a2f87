//! Unique artifact paths and never-overwrite writes
//!
//! Artifact names follow `<checkpoint-stem>-report-<yyyymmddTHHMMSS.mmmZ>.json`.
//! When two runs finish within the same millisecond a numeric suffix is
//! appended (`...-2.json`, `...-3.json`).

use super::{OutputError, OutputResult};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound on suffixes tried before giving up
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Artifact file name for `stem` at `at`, with an optional collision suffix
pub fn artifact_file_name(stem: &str, at: DateTime<Utc>, suffix: Option<u32>) -> String {
    let stamp = at.format("%Y%m%dT%H%M%S%.3fZ");
    match suffix {
        Some(n) => format!("{stem}-report-{stamp}-{n}.json"),
        None => format!("{stem}-report-{stamp}.json"),
    }
}

/// Write `bytes` into a new file in `dir` and return its path.
///
/// The content is written and synced to a temp file first, then linked into
/// place with `persist_noclobber`, so an existing file is never replaced.
pub fn write_artifact(
    dir: &Path,
    stem: &str,
    at: DateTime<Utc>,
    bytes: &[u8],
) -> OutputResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| OutputError::IoError(e.to_string()))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(bytes)
        .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let suffix = (attempt > 1).then_some(attempt);
        let candidate = dir.join(artifact_file_name(stem, at, suffix));
        match temp_file.persist_noclobber(&candidate) {
            Ok(_) => {
                debug!(path = %candidate.display(), "Output artifact written");
                return Ok(candidate);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                temp_file = e.file;
            }
            Err(e) => {
                return Err(OutputError::IoError(format!(
                    "Failed to persist {}: {}",
                    candidate.display(),
                    e.error
                )))
            }
        }
    }

    Err(OutputError::NameExhausted(dir.display().to_string()))
}
