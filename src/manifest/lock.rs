//! Process-wide, per-staging-path serialization of manifest updates.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::trace;

use crate::error::{DeployError, Result};

type LockMap = HashMap<PathBuf, Arc<ReentrantMutex<()>>>;

static LOCKS: LazyLock<Mutex<LockMap>> = LazyLock::new(|| Mutex::new(HashMap::new()));

fn lock_for(staging_path: &Path) -> (PathBuf, Arc<ReentrantMutex<()>>) {
    let key = dunce::canonicalize(staging_path).unwrap_or_else(|_| staging_path.to_path_buf());
    let lock = Arc::clone(
        LOCKS
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(()))),
    );
    (key, lock)
}

/// Run `critical` while holding the lock for `staging_path`.
///
/// The lock is reentrant: a nested call from the same thread (the same
/// logical operation) enters immediately. With `exclusive` set the call
/// waits for other holders; otherwise it fails with
/// [`DeployError::LockBusy`] when another thread holds the lock.
///
/// # Errors
///
/// Returns [`DeployError::LockBusy`] for a busy non-waiting attempt, or
/// whatever `critical` returns.
pub fn with_lock<T>(
    staging_path: &Path,
    exclusive: bool,
    critical: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let (key, lock) = lock_for(staging_path);
    let _guard = if exclusive {
        lock.lock()
    } else {
        lock.try_lock().ok_or_else(|| DeployError::LockBusy(key.clone()))?
    };
    trace!("acquired deployment lock {}", key.display());
    critical()
}
