//! Per-player async locks used to serialize joins.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async lock per player name
///
/// Locks live only in this process; separate processes sharing one database
/// are not serialized against each other.
#[derive(Clone, Default)]
pub struct PlayerLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held locks of one join; released on drop
pub struct PlayerLocksGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every named player.
    ///
    /// Names are deduplicated and taken in sorted order, so two callers with
    /// overlapping participants cannot deadlock.
    pub async fn acquire<'a, I>(&self, names: I) -> PlayerLocksGuard
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: BTreeSet<&str> = names.into_iter().collect();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            names
                .iter()
                .map(|name| Arc::clone(locks.entry((*name).to_string()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        PlayerLocksGuard { _guards: guards }
    }

    /// Number of player locks currently tracked
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_duplicate_names_lock_once() {
        let locks = PlayerLocks::new();
        // Would deadlock if "A" were locked twice
        let _guard = locks.acquire(["A", "B", "A"]).await;
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_acquire_waits_for_release() {
        let locks = PlayerLocks::new();
        let guard = locks.acquire(["A", "B"]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(["B", "C"]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "B is still held");

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = PlayerLocks::new();
        drop(locks.acquire(["A", "B"]).await);
        let _guard = locks.acquire(["C"]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
