//! Bounded in-memory snapshot retention
//!
//! The collector keeps the most recent snapshots in insertion order. Readers
//! share the lock; an append excludes everyone while it pushes and trims.

use crate::models::Snapshot;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of snapshots retained
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO of received snapshots
#[derive(Debug, Clone)]
pub struct RetentionStore {
    snapshots: Arc<RwLock<VecDeque<Arc<Snapshot>>>>,
    capacity: usize,
}

impl Default for RetentionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RetentionStore {
    /// Create a store holding at most `capacity` snapshots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a snapshot, dropping the oldest entries beyond capacity.
    ///
    /// A zero timestamp is replaced with the current time.
    pub async fn append(&self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        if snapshot.timestamp == 0 {
            snapshot.timestamp = chrono::Utc::now().timestamp();
        }
        let snapshot = Arc::new(snapshot);

        let mut snapshots = self.snapshots.write().await;
        snapshots.push_back(snapshot.clone());
        while snapshots.len() > self.capacity {
            snapshots.pop_front();
        }

        snapshot
    }

    /// Most recently appended snapshot
    pub async fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.read().await.back().cloned()
    }

    /// All retained snapshots, oldest first
    pub async fn all(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.read().await.iter().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(timestamp: i64) -> Snapshot {
        Snapshot::new(vec![], vec![], timestamp)
    }

    #[tokio::test]
    async fn test_keeps_last_capacity_entries_in_order() {
        let store = RetentionStore::new(3);

        for ts in 1..=5 {
            store.append(snapshot(ts)).await;
        }

        let timestamps: Vec<i64> = store.all().await.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn test_latest() {
        let store = RetentionStore::default();
        assert!(store.latest().await.is_none());

        store.append(snapshot(10)).await;
        store.append(snapshot(20)).await;

        assert_eq!(store.latest().await.unwrap().timestamp, 20);
    }

    #[tokio::test]
    async fn test_zero_timestamp_is_assigned() {
        let store = RetentionStore::default();
        let before = chrono::Utc::now().timestamp();

        let stored = store.append(snapshot(0)).await;

        assert!(stored.timestamp >= before);
        assert_eq!(store.latest().await.unwrap().timestamp, stored.timestamp);
    }

    #[tokio::test]
    async fn test_capacity_has_floor_of_one() {
        let store = RetentionStore::new(0);
        assert_eq!(store.capacity(), 1);

        store.append(snapshot(1)).await;
        store.append(snapshot(2)).await;
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_all_is_a_copy() {
        let store = RetentionStore::new(10);
        store.append(snapshot(1)).await;

        let before = store.all().await;
        store.append(snapshot(2)).await;

        assert_eq!(before.len(), 1);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers() {
        let store = RetentionStore::new(50);
        let mut handles = Vec::new();

        for writer in 0..4i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 1..=100 {
                    store.append(snapshot(writer * 1000 + i)).await;
                }
            }));
        }

        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let all = store.all().await;
                    assert!(all.len() <= 50);
                    assert!(all.iter().all(|s| s.timestamp != 0));
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await, 50);
    }
}
