//! Per-working-copy mutual exclusion.
//!
//! Two deliveries for the same target must not interleave git commands on
//! one checkout. Runs for different paths proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the working copy at `path`.
    ///
    /// Spellings of the same directory (trailing slash, symlink) share one
    /// lock; see [`lock_key`].
    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let key = lock_key(path);
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key).or_default())
        };

        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(path, "Waiting for in-flight deployment of the same working copy");
                lock.lock_owned().await
            }
        }
    }
}

/// The canonical path when it resolves, otherwise `path` without trailing
/// slashes.
fn lock_key(path: &str) -> String {
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved.to_string_lossy().into_owned(),
        Err(_) => match path.trim_end_matches('/') {
            "" if path.starts_with('/') => "/".to_string(),
            trimmed => trimmed.to_string(),
        },
    }
}
