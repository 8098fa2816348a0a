//! Keyed async locks.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use coopledger_core::posting::{LedgerKey, PostingError};

type Table<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// One async mutex per key, created on first use.
///
/// An entry is removed when the last guard on it is dropped and nobody else
/// is waiting, so the table holds only contended or held keys.
#[derive(Debug)]
pub struct LockMap<K: Eq + Hash> {
    table: Table<K>,
}

impl<K: Eq + Hash> Default for LockMap<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(DashMap::new()),
        }
    }
}

/// Holds one key of a [`LockMap`]; dropping releases it.
#[derive(Debug)]
pub struct LockMapGuard<K: Eq + Hash> {
    table: Table<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for LockMapGuard<K> {
    fn drop(&mut self) {
        self.guard.take();
        release_idle(&self.table, &self.key);
    }
}

// Only the table still owns the mutex: nobody holds or awaits it.
fn release_idle<K: Eq + Hash>(table: &Table<K>, key: &K) {
    table.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

impl<K: Eq + Hash + Copy> LockMap<K> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock on `key`.
    pub async fn lock(&self, key: K) -> LockMapGuard<K> {
        let guard = self.mutex(key).lock_owned().await;
        self.guard(key, guard)
    }

    /// Waits at most `timeout` for the lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns the elapsed error if the lock is not acquired in time.
    pub async fn lock_timeout(
        &self,
        key: K,
        timeout: Duration,
    ) -> Result<LockMapGuard<K>, tokio::time::error::Elapsed> {
        let acquired = tokio::time::timeout(timeout, self.mutex(key).lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(self.guard(key, guard)),
            Err(elapsed) => {
                release_idle(&self.table, &key);
                Err(elapsed)
            }
        }
    }

    /// Number of keys currently in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn mutex(&self, key: K) -> Arc<Mutex<()>> {
        // Clone the Arc out so the shard lock is not held across the await.
        Arc::clone(self.table.entry(key).or_default().value())
    }

    fn guard(&self, key: K, guard: OwnedMutexGuard<()>) -> LockMapGuard<K> {
        LockMapGuard {
            table: Arc::clone(&self.table),
            key,
            guard: Some(guard),
        }
    }
}

/// Guards held for the keys of one posting; dropping releases them.
#[derive(Debug)]
pub struct KeyGuards {
    _guards: Vec<LockMapGuard<LedgerKey>>,
}

/// One async mutex per (member, account) key.
///
/// Keys are always acquired in ascending order so two postings touching the
/// same keys cannot deadlock. Postings on disjoint keys never wait for each
/// other.
#[derive(Debug)]
pub struct KeyLocks {
    locks: LockMap<LedgerKey>,
    timeout: Duration,
}

impl KeyLocks {
    /// Creates an empty lock table with a lock-wait timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: LockMap::new(),
            timeout,
        }
    }

    /// Locks every key, in key order.
    ///
    /// # Errors
    ///
    /// Returns `PostingConflict` if any lock is not acquired within the
    /// timeout. Locks already taken are released.
    pub async fn acquire(&self, keys: &[LedgerKey]) -> Result<KeyGuards, PostingError> {
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            let guard = self
                .locks
                .lock_timeout(key, self.timeout)
                .await
                .map_err(|_| {
                    PostingError::PostingConflict(format!(
                        "lock wait on account {} timed out after {} ms",
                        key.account_id,
                        self.timeout.as_millis()
                    ))
                })?;
            guards.push(guard);
        }
        Ok(KeyGuards { _guards: guards })
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
