// ledger/src/lib.rs
pub mod adapters;
pub mod asset;
pub mod codec;
pub mod context;
pub mod contract;
pub mod error;
pub mod rwset;
pub mod seed;

pub use asset::{Asset, AssetVersion};
pub use context::{LedgerContext, TransactionContext};
pub use error::LedgerError;
pub use rwset::{ReadWriteSet, VersionedValue, WriteCondition};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One committed write to a key, as produced by a history cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModification {
    pub tx_id: Uuid,
    pub value: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Versioned key-value store that hands out transactions.
#[async_trait]
pub trait WorldState: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StateTransaction>, LedgerError>;
}

/// Store access for the duration of one transaction.
/// Implementors MUST:
/// 1. Return this transaction's own pending write from `get_state` before
///    consulting committed state
/// 2. Buffer `put_state` until `commit`, keeping the last value per key
/// 3. On `commit`, reject with `Conflict` if any key read has changed version,
///    applying nothing
/// 4. Append one history entry per written key on a successful commit
#[async_trait]
pub trait StateTransaction: Send {
    fn tx_id(&self) -> Uuid;

    /// `None` when the key has never been written.
    async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;
    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    /// Committed versions of `key`, oldest first. The caller must close it.
    async fn get_history_for_key(
        &mut self,
        key: &str,
    ) -> Result<Box<dyn HistoryIterator>, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;
    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Ordered, non-restartable cursor over the history of one key.
#[async_trait]
pub trait HistoryIterator: Send {
    /// `Ok(None)` once exhausted.
    async fn next(&mut self) -> Result<Option<KeyModification>, LedgerError>;
    /// Release the cursor. Calling `next` afterwards yields `Ok(None)`.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryWorldState;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cloned_contexts_share_world_state() {
        let ctx = LedgerContext::new(Arc::new(MemoryWorldState::new()));
        let other = ctx.clone();

        let mut tx = ctx.begin().await.unwrap();
        tx.create_asset(Asset::new("D100", "1", "2")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = other.begin().await.unwrap();
        assert!(tx.asset_exists("D100").await.unwrap());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            LedgerError::NotFound("D999".to_string()).to_string(),
            "asset D999 does not exist"
        );
        assert_eq!(
            LedgerError::AlreadyExists("D001".to_string()).to_string(),
            "asset D001 already exists"
        );
        assert!(LedgerError::Conflict("D001".to_string()).is_conflict());
    }
}
