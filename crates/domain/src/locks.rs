//! Per-aggregate serialization of command processing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::AggregateId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A table of async mutexes, one per aggregate id.
///
/// Holding the guard for an id makes load, decide, append and snapshot
/// refresh for that id run one at a time within this process. Different ids
/// never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    locks: Arc<Mutex<HashMap<AggregateId, Arc<AsyncMutex<()>>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn lock(&self, id: AggregateId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            locks.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        entry.lock_owned().await
    }

    /// Number of ids currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
