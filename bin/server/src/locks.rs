//! Per-object locks that make a cache miss fetch upstream only once

use common::ObjectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockKey = (String, ObjectId);

/// Guard for one `(repo, object)` key; the key is released when it drops
pub type ObjectGuard = OwnedMutexGuard<()>;

/// Async mutexes keyed by repository and object id.
///
/// Entries are held weakly: a key's mutex lives only as long as some caller
/// holds or waits for it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(repo, id)`
    pub async fn acquire(&self, repo: &str, id: &ObjectId) -> ObjectGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);

            let key = (repo.to_string(), id.clone());
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(AsyncMutex::new(()));
                    locks.insert(key, Arc::downgrade(&mutex));
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }

    /// Number of keys currently held or awaited
    pub fn in_flight(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}
