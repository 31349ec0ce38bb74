// ledger/src/contract.rs
//! Asset lifecycle operations.
//!
//! Each operation runs inside the caller's [`TransactionContext`] and keys
//! the world state by dealer id. Nothing here locks: create and update rely
//! on the store rejecting the commit if a key they read has moved on.

use crate::{Asset, AssetVersion, KeyModification, LedgerError, TransactionContext, codec, seed};
use tracing::{debug, info};

impl TransactionContext {
    /// Write the sample dealers that are not already present.
    ///
    /// Returns the dealer ids written. A failed put aborts the remaining
    /// seeds; earlier puts stay in the transaction.
    pub async fn init_ledger(&mut self) -> Result<Vec<String>, LedgerError> {
        let mut seeded = Vec::new();

        for asset in seed::sample_assets() {
            if self.asset_exists(&asset.dealer_id).await? {
                debug!(dealer_id = %asset.dealer_id, "seed already present, skipping");
                continue;
            }

            let bytes = codec::encode(&asset)?;
            self.stub().put_state(&asset.dealer_id, bytes).await?;
            seeded.push(asset.dealer_id);
        }

        info!(tx_id = %self.tx_id(), seeded = seeded.len(), "ledger initialised");
        Ok(seeded)
    }

    pub async fn asset_exists(&mut self, dealer_id: &str) -> Result<bool, LedgerError> {
        let value = self.stub().get_state(dealer_id).await?;
        Ok(value.is_some())
    }

    /// Store a new dealer record. No field validation is applied.
    pub async fn create_asset(&mut self, asset: Asset) -> Result<(), LedgerError> {
        if self.asset_exists(&asset.dealer_id).await? {
            return Err(LedgerError::AlreadyExists(asset.dealer_id));
        }

        let bytes = codec::encode(&asset)?;
        self.stub().put_state(&asset.dealer_id, bytes).await?;

        info!(tx_id = %self.tx_id(), dealer_id = %asset.dealer_id, "asset created");
        Ok(())
    }

    pub async fn query_asset(&mut self, dealer_id: &str) -> Result<Asset, LedgerError> {
        let bytes = self
            .stub()
            .get_state(dealer_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(dealer_id.to_string()))?;

        debug!(dealer_id = %dealer_id, bytes = bytes.len(), "asset read");
        codec::decode(&bytes)
    }

    /// Replace balance and status. Update never creates a record.
    pub async fn update_asset(
        &mut self,
        dealer_id: &str,
        new_balance: i64,
        new_status: &str,
    ) -> Result<(), LedgerError> {
        let mut asset = self.query_asset(dealer_id).await?;
        asset.apply_update(new_balance, new_status.to_string());

        let bytes = codec::encode(&asset)?;
        self.stub().put_state(dealer_id, bytes).await?;

        info!(
            tx_id = %self.tx_id(),
            dealer_id = %dealer_id,
            balance = new_balance,
            status = %new_status,
            "asset updated"
        );
        Ok(())
    }

    /// Every committed value of the dealer's record, oldest first, as stored.
    ///
    /// A never-written dealer yields an empty list. Entries are not decoded,
    /// but a value that is not UTF-8 fails the call with `Decoding`.
    pub async fn get_transaction_history(
        &mut self,
        dealer_id: &str,
    ) -> Result<Vec<String>, LedgerError> {
        self.drain_history(dealer_id)
            .await?
            .into_iter()
            .map(|entry| {
                String::from_utf8(entry.value).map_err(|e| LedgerError::Decoding(e.to_string()))
            })
            .collect()
    }

    /// Like [`get_transaction_history`](Self::get_transaction_history), with
    /// each entry decoded and tagged with the transaction that wrote it.
    pub async fn get_asset_history(
        &mut self,
        dealer_id: &str,
    ) -> Result<Vec<AssetVersion>, LedgerError> {
        self.drain_history(dealer_id)
            .await?
            .into_iter()
            .map(|entry| {
                Ok(AssetVersion {
                    tx_id: entry.tx_id,
                    timestamp: entry.timestamp,
                    asset: codec::decode(&entry.value)?,
                })
            })
            .collect()
    }

    /// Read the whole cursor. The cursor is closed on every path, and a
    /// failure part way through discards what was read.
    async fn drain_history(&mut self, dealer_id: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let mut cursor = self.stub().get_history_for_key(dealer_id).await?;

        let mut entries = Vec::new();
        let drained = loop {
            match cursor.next().await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break Ok(entries),
                Err(err) => break Err(err),
            }
        };
        cursor.close().await;

        debug!(dealer_id = %dealer_id, ok = drained.is_ok(), "history drained");
        drained
    }
}
