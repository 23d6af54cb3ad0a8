use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::records::RecordId;

/// Idle lock entries are swept once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per record, so transitions on the same record run one at
/// a time while different records proceed in parallel.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<RecordId, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `record_id`. Access ends when the guard drops.
    pub async fn acquire(&self, record_id: RecordId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                // Only the table itself holds idle entries.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(record_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of records with a lock entry; idle entries may linger until pruned.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
