//! Per-table mutual exclusion.
//!
//! Every mutating table operation runs while holding the table's lock. The
//! lock is an in-process mutex; next to it an advisory sentinel file records
//! `locked` / `unlocked` for anyone watching the data directory. The sentinel
//! is never read back and offers no cross-process guarantee.

use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

pub const LOCKED: &str = "locked";
pub const UNLOCKED: &str = "unlocked";

/// Exclusive lock over one table's mutable state.
///
/// The protected value (the primary-key counter for tables) is only reachable
/// through a [`TableLockGuard`].
pub struct TableLock<T> {
    /// Advisory sentinel file (`<schema>/<table>_lock`).
    sentinel: PathBuf,
    state: Mutex<T>,
}

impl<T> TableLock<T> {
    pub fn new(sentinel: PathBuf, state: T) -> Self {
        Self {
            sentinel,
            state: Mutex::new(state),
        }
    }

    pub fn sentinel_path(&self) -> &Path {
        &self.sentinel
    }

    /// Blocks until the lock is free, then marks the sentinel as locked.
    pub fn acquire(&self) -> TableLockGuard<'_, T> {
        let guard = self.state.lock();
        write_sentinel(&self.sentinel, LOCKED);
        TableLockGuard {
            sentinel: &self.sentinel,
            guard,
        }
    }

    /// Copies out the protected value without marking the sentinel.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.state.lock().clone()
    }
}

/// Held lock. Dropping it marks the sentinel unlocked and releases the mutex,
/// so release happens once on every exit path.
pub struct TableLockGuard<'a, T> {
    sentinel: &'a Path,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for TableLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for TableLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for TableLockGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `guard` is dropped: the sentinel flips while still held.
        write_sentinel(self.sentinel, UNLOCKED);
    }
}

fn write_sentinel(path: &Path, state: &str) {
    if let Err(e) = fs::write(path, state) {
        warn!(path = %path.display(), error = %e, state, "failed to update lock sentinel");
    }
}
