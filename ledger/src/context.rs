// ledger/src/context.rs
use crate::{LedgerError, StateTransaction, WorldState};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct LedgerContext {
    world_state: Arc<dyn WorldState>,
}

impl LedgerContext {
    pub fn new(world_state: Arc<dyn WorldState>) -> Self {
        Self { world_state }
    }

    pub async fn begin(&self) -> Result<TransactionContext, LedgerError> {
        let tx = self.world_state.begin().await?;
        Ok(TransactionContext::new(tx))
    }
}

/// Handle on one open world state transaction.
///
/// The asset operations live on this type, so every operation called on the
/// same context shares one read/write set and sees the writes made before it.
pub struct TransactionContext {
    stub: Box<dyn StateTransaction>,
}

impl TransactionContext {
    pub fn new(stub: Box<dyn StateTransaction>) -> Self {
        Self { stub }
    }

    pub fn tx_id(&self) -> Uuid {
        self.stub.tx_id()
    }

    /// Raw store access for this transaction.
    pub fn stub(&mut self) -> &mut dyn StateTransaction {
        self.stub.as_mut()
    }

    pub async fn commit(self) -> Result<(), LedgerError> {
        self.stub.commit().await
    }

    pub async fn rollback(self) -> Result<(), LedgerError> {
        self.stub.rollback().await
    }
}
