//! Per-cluster serialization
//!
//! Get-then-act sequences are not atomic against a concurrent pass for the
//! same cluster, so every pass holds the cluster's lock from start to end.
//! Different clusters never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutex per cluster key (`namespace/name`)
#[derive(Clone, Default)]
pub struct ClusterLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ClusterLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drop the entry for `key` if nobody holds or waits on it
    pub fn forget(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of tracked clusters
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no cluster is tracked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
