//! Non-blocking checkout locks
//!
//! Two commands for the same pull request must not use one checkout at the
//! same time. Locks live in memory only; they never outlive the process.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Identity of a checkout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceLockKey {
    /// `owner/name` of the base repo
    pub repo_full_name: String,
    /// Pull request number
    pub pull_num: u64,
    /// Workspace
    pub workspace: String,
    /// Repo-relative path
    pub path: String,
}

/// Hands out at most one [`WorkspaceLock`] per key
///
/// Clones share the same lock table.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLockCoordinator {
    held: Arc<DashMap<WorkspaceLockKey, ()>>,
}

impl WorkspaceLockCoordinator {
    /// Empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for a checkout; `None` immediately when it is held
    #[must_use]
    pub fn try_lock(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
        path: &str,
    ) -> Option<WorkspaceLock> {
        let key = WorkspaceLockKey {
            repo_full_name: repo_full_name.to_string(),
            pull_num,
            workspace: workspace.to_string(),
            path: path.to_string(),
        };
        match self.held.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(?key, "workspace lock is held");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(WorkspaceLock {
                    key,
                    held: Arc::clone(&self.held),
                    released: false,
                })
            }
        }
    }

    /// Whether a key is currently held
    #[must_use]
    pub fn is_locked(&self, key: &WorkspaceLockKey) -> bool {
        self.held.contains_key(key)
    }

    /// Number of held locks
    #[must_use]
    pub fn held(&self) -> usize {
        self.held.len()
    }
}

/// A held checkout lock; released by [`WorkspaceLock::unlock`] or on drop
#[derive(Debug)]
#[must_use = "the lock is released as soon as it is dropped"]
pub struct WorkspaceLock {
    key: WorkspaceLockKey,
    held: Arc<DashMap<WorkspaceLockKey, ()>>,
    released: bool,
}

impl WorkspaceLock {
    /// Key of the lock
    #[inline]
    #[must_use]
    pub fn key(&self) -> &WorkspaceLockKey {
        &self.key
    }

    /// Release the lock; further calls do nothing
    pub fn unlock(&mut self) {
        if !self.released {
            self.held.remove(&self.key);
            self.released = true;
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn second_caller_is_refused_until_release() {
        let locks = WorkspaceLockCoordinator::new();
        let mut first = locks.try_lock("owner/repo", 1, "default", ".").unwrap();
        assert!(locks.try_lock("owner/repo", 1, "default", ".").is_none());
        assert!(locks.is_locked(first.key()));

        first.unlock();
        first.unlock();
        assert_eq!(locks.held(), 0);
        assert!(locks.try_lock("owner/repo", 1, "default", ".").is_some());
    }

    #[test]
    fn keys_are_independent() {
        let locks = WorkspaceLockCoordinator::new();
        let _a = locks.try_lock("owner/repo", 1, "default", ".").unwrap();
        let _b = locks.try_lock("owner/repo", 1, "staging", ".").unwrap();
        let _c = locks.try_lock("owner/repo", 2, "default", ".").unwrap();
        let _d = locks.try_lock("owner/repo", 1, "default", "dir1").unwrap();
        assert_eq!(locks.held(), 4);
    }

    #[test]
    fn drop_releases_and_stale_unlock_keeps_new_holder() {
        let locks = WorkspaceLockCoordinator::new();
        {
            let _guard = locks.try_lock("owner/repo", 1, "default", ".").unwrap();
        }
        let mut stale = locks.try_lock("owner/repo", 1, "default", ".").unwrap();
        stale.unlock();
        let _current = locks.try_lock("owner/repo", 1, "default", ".").unwrap();
        drop(stale);
        assert_eq!(locks.held(), 1);
    }

    #[test]
    fn one_winner_under_contention() {
        let locks = WorkspaceLockCoordinator::new();
        let wins = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let wins = Arc::clone(&wins);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let guard = locks.try_lock("owner/repo", 7, "default", ".");
                    if guard.is_some() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                    barrier.wait();
                    drop(guard);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(locks.held(), 0);
    }
}
