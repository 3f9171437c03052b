//! Run-wide content deduplication.
//!
//! The index maps content hashes to the path that first persisted them. Tasks
//! carrying the same hash are serialized through a per-hash reservation: the
//! first holder processes the file, later ones wait and then re-check. A
//! holder that fails or is cancelled before persisting drops its reservation
//! and the next waiter takes over. Once persisting starts, the reservation is
//! owned by the write and committed with it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type Committed = Arc<Mutex<HashMap<String, String>>>;

/// Shared `content_hash -> source_path` map for one run.
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    committed: Committed,
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Result of [`DeduplicationIndex::reserve`].
#[derive(Debug)]
pub enum DedupCheck {
    /// Content already persisted under this path.
    Duplicate(String),
    /// Caller owns the hash until the reservation is committed or dropped.
    Reserved(Reservation),
}

/// Exclusive claim on one content hash.
#[derive(Debug)]
pub struct Reservation {
    hash: String,
    committed: Committed,
    _guard: OwnedMutexGuard<()>,
}

impl Reservation {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Record the persisted path for this hash and release waiters.
    pub fn commit(self, source_path: impl Into<String>) {
        let source_path = source_path.into();
        debug!("Dedup index: {} -> {}", &self.hash[..self.hash.len().min(12)], source_path);
        lock(&self.committed)
            .entry(self.hash.clone())
            .or_insert(source_path);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The guarded maps stay consistent even if a holder panicked.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from hashes already in the store.
    pub fn seeded(existing: HashMap<String, String>) -> Self {
        Self {
            committed: Arc::new(Mutex::new(existing)),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Canonical path for `hash`, if one has been persisted.
    pub fn check_duplicate(&self, hash: &str) -> Option<String> {
        lock(&self.committed).get(hash).cloned()
    }

    /// Claim `hash`, waiting while another task holds it.
    pub async fn reserve(&self, hash: &str) -> DedupCheck {
        if let Some(canonical) = self.check_duplicate(hash) {
            return DedupCheck::Duplicate(canonical);
        }

        let slot = {
            let mut slots = lock(&self.slots);
            slots
                .entry(hash.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;

        // The previous holder may have committed while we waited.
        if let Some(canonical) = self.check_duplicate(hash) {
            return DedupCheck::Duplicate(canonical);
        }

        DedupCheck::Reserved(Reservation {
            hash: hash.to_string(),
            committed: self.committed.clone(),
            _guard: guard,
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.committed).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn reserved(check: DedupCheck) -> Reservation {
        match check {
            DedupCheck::Reserved(r) => r,
            DedupCheck::Duplicate(path) => panic!("unexpected duplicate of {}", path),
        }
    }

    #[tokio::test]
    async fn test_seeded_hash_is_duplicate() {
        let mut existing = HashMap::new();
        existing.insert("abc".to_string(), "/docs/a.txt".to_string());
        let index = DeduplicationIndex::seeded(existing);

        match index.reserve("abc").await {
            DedupCheck::Duplicate(path) => assert_eq!(path, "/docs/a.txt"),
            DedupCheck::Reserved(_) => panic!("expected duplicate"),
        }
        assert!(index.check_duplicate("def").is_none());
    }

    #[tokio::test]
    async fn test_commit_makes_waiter_duplicate() {
        let index = Arc::new(DeduplicationIndex::new());
        let first = reserved(index.reserve("h1").await);

        let waiter = {
            let index = index.clone();
            tokio::spawn(async move {
                match index.reserve("h1").await {
                    DedupCheck::Duplicate(path) => Some(path),
                    DedupCheck::Reserved(_) => None,
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        first.commit("/docs/first.md");

        assert_eq!(waiter.await.unwrap().as_deref(), Some("/docs/first.md"));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_reservation_passes_to_next_waiter() {
        let index = Arc::new(DeduplicationIndex::new());
        let first = reserved(index.reserve("h2").await);

        let waiter = {
            let index = index.clone();
            tokio::spawn(async move { matches!(index.reserve("h2").await, DedupCheck::Reserved(_)) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Holder failed without persisting
        drop(first);

        assert!(waiter.await.unwrap());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_hashes_do_not_block() {
        let index = DeduplicationIndex::new();
        let _a = reserved(index.reserve("a").await);
        let b = tokio::time::timeout(Duration::from_millis(100), index.reserve("b"))
            .await
            .expect("reservation for another hash must not wait");
        assert!(matches!(b, DedupCheck::Reserved(_)));
    }
}
