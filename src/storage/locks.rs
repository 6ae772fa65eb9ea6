//! Per-stem locking
//!
//! Every storage operation on a stem runs while holding that stem's guard.
//! Operations on different stems proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive access to one stem. Released on drop.
pub struct StemGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of one async mutex per stem
#[derive(Default)]
pub struct StemLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `stem`.
    ///
    /// Callers must drop the guard before awaiting any network I/O.
    pub async fn acquire(&self, stem: &str) -> StemGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(stem.to_string()).or_default())
        };
        StemGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of stems with a live lock entry
    pub async fn tracked_stems(&self) -> usize {
        self.locks.lock().await.len()
    }
}
