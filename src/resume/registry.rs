//! In-process registry of running scans
//!
//! Guarantees at most one in-flight scan per [`ScanIdentity`] inside this
//! process. Executors share [`ScanRegistry::global`] unless handed another
//! registry explicitly;
//! entries are only added by [`ScanRegistry::start`] and only removed when the
//! returned [`ScanGuard`] is dropped, on success and error paths alike.
//!
//! This is not a filesystem lock: a second process working on the same
//! checkpoint directory is not detected.

use super::state::ResumeError;
use crate::identifier::ScanIdentity;
use std::collections::HashSet;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Shared handle to a registry
pub type SharedRegistry = Arc<ScanRegistry>;

static GLOBAL_REGISTRY: Lazy<SharedRegistry> = Lazy::new(ScanRegistry::shared);

/// Set of identities with a scan in flight
#[derive(Debug, Default)]
pub struct ScanRegistry {
    running: Mutex<HashSet<ScanIdentity>>,
}

impl ScanRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry wrapped in [`Arc`]
    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }

    /// Process-wide registry used by default
    pub fn global() -> SharedRegistry {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register `identity` as running.
    ///
    /// Fails fast with [`ResumeError::AlreadyRunning`] instead of waiting.
    pub fn start(self: &Arc<Self>, identity: &ScanIdentity) -> Result<ScanGuard, ResumeError> {
        if !self.entries().insert(identity.clone()) {
            return Err(ResumeError::AlreadyRunning {
                key: identity.key(),
            });
        }
        debug!(key = %identity.key(), "Scan registered as running");
        Ok(ScanGuard {
            registry: Arc::clone(self),
            identity: identity.clone(),
        })
    }

    /// Whether a scan for `identity` is in flight
    pub fn is_running(&self, identity: &ScanIdentity) -> bool {
        self.entries().contains(identity)
    }

    /// Number of scans in flight
    pub fn running_count(&self) -> usize {
        self.entries().len()
    }

    fn stop(&self, identity: &ScanIdentity) {
        self.entries().remove(identity);
        debug!(key = %identity.key(), "Scan unregistered");
    }

    fn entries(&self) -> MutexGuard<'_, HashSet<ScanIdentity>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of registration; unregisters on drop
#[derive(Debug)]
pub struct ScanGuard {
    registry: SharedRegistry,
    identity: ScanIdentity,
}

impl ScanGuard {
    /// Identity this guard holds
    pub fn identity(&self) -> &ScanIdentity {
        &self.identity
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.registry.stop(&self.identity);
    }
}
