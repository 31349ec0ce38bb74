// ledger/src/adapters/memory.rs
use crate::{
    HistoryIterator, KeyModification, LedgerError, ReadWriteSet, StateTransaction, VersionedValue,
    WorldState,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    state: HashMap<String, VersionedValue>,
    history: HashMap<String, Vec<KeyModification>>,
}

type SharedStore = Arc<Mutex<MemoryStore>>;

fn lock(store: &SharedStore) -> Result<MutexGuard<'_, MemoryStore>, LedgerError> {
    store
        .lock()
        .map_err(|_| LedgerError::StoreRead("memory world state lock poisoned".to_string()))
}

/// Process-local world state. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryWorldState {
    store: SharedStore,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed version of `key`, or `None` if it was never written.
    pub fn version(&self, key: &str) -> Result<Option<u64>, LedgerError> {
        let store = lock(&self.store)?;
        Ok(store.state.get(key).map(|v| v.version))
    }
}

#[async_trait]
impl WorldState for MemoryWorldState {
    async fn begin(&self) -> Result<Box<dyn StateTransaction>, LedgerError> {
        Ok(Box::new(MemoryTransaction {
            tx_id: Uuid::now_v7(),
            store: Arc::clone(&self.store),
            rwset: ReadWriteSet::new(),
        }))
    }
}

struct MemoryTransaction {
    tx_id: Uuid,
    store: SharedStore,
    rwset: ReadWriteSet,
}

#[async_trait]
impl StateTransaction for MemoryTransaction {
    fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(pending) = self.rwset.pending(key) {
            return Ok(Some(pending.to_vec()));
        }

        let committed = lock(&self.store)?.state.get(key).cloned();
        self.rwset
            .record_read(key, committed.as_ref().map(|v| v.version));
        Ok(committed.map(|v| v.value))
    }

    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.rwset.write(key, value);
        Ok(())
    }

    async fn get_history_for_key(
        &mut self,
        key: &str,
    ) -> Result<Box<dyn HistoryIterator>, LedgerError> {
        let entries = lock(&self.store)?
            .history
            .get(key)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(MemoryHistoryIterator {
            entries: entries.into(),
        }))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.rwset.is_read_only() {
            return Ok(());
        }

        let mut store = self
            .store
            .lock()
            .map_err(|_| LedgerError::StoreWrite("memory world state lock poisoned".to_string()))?;

        for (key, observed) in self.rwset.reads() {
            let current = store.state.get(key).map(|v| v.version);
            if current != observed {
                warn!(tx_id = %self.tx_id, key = %key, ?observed, ?current, "read conflict");
                return Err(LedgerError::Conflict(key.to_string()));
            }
        }

        let committed_at = Utc::now();
        for (key, value, _) in self.rwset.writes() {
            let version = store.state.get(key).map_or(1, |v| v.version + 1);
            store.state.insert(
                key.to_string(),
                VersionedValue {
                    value: value.to_vec(),
                    version,
                },
            );
            store
                .history
                .entry(key.to_string())
                .or_default()
                .push(KeyModification {
                    tx_id: self.tx_id,
                    value: value.to_vec(),
                    timestamp: committed_at,
                });
        }

        debug!(tx_id = %self.tx_id, "memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        debug!(tx_id = %self.tx_id, "memory transaction rolled back");
        Ok(())
    }
}

struct MemoryHistoryIterator {
    entries: VecDeque<KeyModification>,
}

#[async_trait]
impl HistoryIterator for MemoryHistoryIterator {
    async fn next(&mut self) -> Result<Option<KeyModification>, LedgerError> {
        Ok(self.entries.pop_front())
    }

    async fn close(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_your_writes() {
        let world = MemoryWorldState::new();
        let mut tx = world.begin().await.unwrap();

        assert_eq!(tx.get_state("k").await.unwrap(), None);
        tx.put_state("k", b"v1".to_vec()).await.unwrap();
        assert_eq!(tx.get_state("k").await.unwrap(), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let world = MemoryWorldState::new();
        let mut writer = world.begin().await.unwrap();
        writer.put_state("k", b"v1".to_vec()).await.unwrap();

        let mut reader = world.begin().await.unwrap();
        assert_eq!(reader.get_state("k").await.unwrap(), None);

        writer.rollback().await.unwrap();
        assert_eq!(world.version("k").unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_history() {
        let world = MemoryWorldState::new();

        for value in [b"v1", b"v2"] {
            let mut tx = world.begin().await.unwrap();
            tx.get_state("k").await.unwrap();
            tx.put_state("k", value.to_vec()).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(world.version("k").unwrap(), Some(2));

        let mut tx = world.begin().await.unwrap();
        let mut cursor = tx.get_history_for_key("k").await.unwrap();
        assert_eq!(cursor.next().await.unwrap().unwrap().value, b"v1".to_vec());
        assert_eq!(cursor.next().await.unwrap().unwrap().value, b"v2".to_vec());
        assert!(cursor.next().await.unwrap().is_none());
        cursor.close().await;
    }

    #[tokio::test]
    async fn test_repeated_puts_commit_once() {
        let world = MemoryWorldState::new();
        let mut tx = world.begin().await.unwrap();
        tx.put_state("k", b"a".to_vec()).await.unwrap();
        tx.put_state("k", b"b".to_vec()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = world.begin().await.unwrap();
        let mut cursor = tx.get_history_for_key("k").await.unwrap();
        assert_eq!(cursor.next().await.unwrap().unwrap().value, b"b".to_vec());
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_insert_conflicts() {
        let world = MemoryWorldState::new();

        let mut first = world.begin().await.unwrap();
        let mut second = world.begin().await.unwrap();
        assert_eq!(first.get_state("k").await.unwrap(), None);
        assert_eq!(second.get_state("k").await.unwrap(), None);
        first.put_state("k", b"first".to_vec()).await.unwrap();
        second.put_state("k", b"second".to_vec()).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert_eq!(err, LedgerError::Conflict("k".to_string()));

        let mut tx = world.begin().await.unwrap();
        assert_eq!(tx.get_state("k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_stale_read_only_key_conflicts() {
        let world = MemoryWorldState::new();

        let mut tx = world.begin().await.unwrap();
        tx.get_state("watched").await.unwrap();
        tx.put_state("other", b"x".to_vec()).await.unwrap();

        let mut interloper = world.begin().await.unwrap();
        interloper.put_state("watched", b"y".to_vec()).await.unwrap();
        interloper.commit().await.unwrap();

        assert!(tx.commit().await.unwrap_err().is_conflict());
        assert_eq!(world.version("other").unwrap(), None);
    }

    #[tokio::test]
    async fn test_poisoned_store_fails_commit_with_store_write() {
        let world = MemoryWorldState::new();
        let mut tx = world.begin().await.unwrap();
        tx.put_state("k", b"v".to_vec()).await.unwrap();

        let store = Arc::clone(&world.store);
        let _ = std::thread::spawn(move || {
            let _guard = store.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        let err = tx.commit().await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::StoreWrite("memory world state lock poisoned".to_string())
        );
        assert_eq!(
            err.to_string(),
            "failed to write world state: memory world state lock poisoned"
        );
    }
}
