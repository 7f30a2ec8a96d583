//! Per-file advisory locks.
//!
//! Nothing stops a user from triggering two syncs of the same file back to
//! back; racing two retrieval/deployment flows against one file is undefined
//! interleaving. Each invocation therefore holds an in-memory token keyed by
//! file path for its whole duration, and a second invocation on the same
//! file is rejected up front.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Registry of files with a sync currently in flight.
#[derive(Default)]
pub struct SyncLocks {
    active: Mutex<HashSet<PathBuf>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the CLI.
    pub fn shared() -> Arc<SyncLocks> {
        static SHARED: OnceLock<Arc<SyncLocks>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(SyncLocks::new())).clone()
    }

    /// Try to claim `path` for one invocation. Returns `None` when a sync
    /// for the same file is already in progress.
    pub fn acquire(self: &Arc<Self>, path: &Path) -> Option<SyncGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(path.to_path_buf()) {
            return None;
        }
        Some(SyncGuard {
            locks: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }
}

/// Held token for one in-flight sync; releases on drop.
pub struct SyncGuard {
    locks: Arc<SyncLocks>,
    path: PathBuf,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        let mut active = self.locks.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.path);
    }
}
