//! # Smartfalcon
//!
//! Dealer account records kept in a versioned key-value world state.
//!
//! Every dealer is one record keyed by its dealer id. The current value can
//! be read, created once and updated in place, and every committed version
//! stays reachable through the key's history.
//!
//! ## Transactions
//!
//! Operations run inside a world state transaction. Reads see the
//! transaction's own writes; writes are buffered and applied at commit only
//! if every key the transaction read is still at the version it saw.
//! Otherwise the commit fails with [`LedgerError::Conflict`] and nothing is
//! written, so two racing creates of the same dealer cannot both succeed.
//!
//! ```rust,ignore
//! let ledger = AssetLedger::new(Box::new(MemoryWorldState::new()));
//!
//! ledger
//!     .atomic(|tx| {
//!         Box::pin(async move {
//!             tx.create_asset(Asset::new("D001", "9876543210", "1234").with_balance(1000))
//!                 .await?;
//!             tx.update_asset("D001", 1500, "active").await
//!         })
//!     })
//!     .await?;
//!
//! let history = ledger.get_transaction_history("D001").await?;
//! ```
//!
//! ## Backends
//!
//! | Backend    | Feature    | Notes                                  |
//! |------------|------------|----------------------------------------|
//! | memory     | always     | process-local, for tests and bootstrap |
//! | `sqlite`   | ✓ default  | in-memory or file via sqlx             |
//! | `postgres` | ✓ default  | row-locked commit validation via sqlx  |
//!
//! ## Observability
//!
//! Emits `tracing` events and `metrics` counters/histograms
//! (`smartfalcon.transactions.total`, `smartfalcon.transaction.duration`,
//! `smartfalcon.assets.seeded`). Installing a subscriber or recorder is left
//! to the application.

pub mod adapters;
pub mod config;
pub mod error;

pub use ledger;
pub use ledger::{
    Asset, AssetVersion, KeyModification, LedgerContext, LedgerError, TransactionContext,
    WorldState, codec,
};

pub use crate::config::{ConfigError, LedgerConfig, StoreConfig};
pub use crate::error::Error;

use metrics::{counter, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Future returned by the closure passed to [`AssetLedger::atomic`].
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'c>>;

/// The AssetLedger is the primary interface for dealer records.
/// It owns the world state and runs each operation inside a transaction.
#[derive(Clone)]
pub struct AssetLedger {
    ctx: LedgerContext,
}

impl AssetLedger {
    pub fn new(world_state: Box<dyn WorldState>) -> Self {
        Self {
            ctx: LedgerContext::new(Arc::from(world_state)),
        }
    }

    /// Build the configured backend, prepare its schema and optionally seed.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, Error> {
        let world_state: Box<dyn WorldState> = match &config.store {
            StoreConfig::Memory => Box::new(adapters::MemoryWorldState::new()),
            #[cfg(feature = "sqlite")]
            StoreConfig::Sqlite {
                url,
                max_connections,
            } => {
                let store = adapters::sqlite::SqliteWorldState::connect(url, *max_connections).await?;
                store.init_schema().await?;
                Box::new(store)
            }
            #[cfg(not(feature = "sqlite"))]
            StoreConfig::Sqlite { .. } => return Err(ConfigError::BackendDisabled("sqlite").into()),
            #[cfg(feature = "postgres")]
            StoreConfig::Postgres {
                url,
                max_connections,
            } => {
                let store =
                    adapters::postgres::PostgresWorldState::connect(url, *max_connections).await?;
                store.init_schema().await?;
                Box::new(store)
            }
            #[cfg(not(feature = "postgres"))]
            StoreConfig::Postgres { .. } => {
                return Err(ConfigError::BackendDisabled("postgres").into());
            }
        };

        let ledger = Self::new(world_state);
        if config.seed_on_start {
            ledger.init_ledger().await?;
        }

        Ok(ledger)
    }

    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    /// Run `f` in a fresh transaction; commit on `Ok`, roll back on `Err`.
    ///
    /// A `Conflict` from commit is returned as is and not retried.
    pub async fn atomic<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: for<'c> FnOnce(&'c mut TransactionContext) -> TxFuture<'c, T>,
    {
        let started = Instant::now();
        let mut tx = self.ctx.begin().await?;
        let tx_id = tx.tx_id();

        let outcome = f(&mut tx).await;
        let (status, result) = match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => ("committed", Ok(value)),
                Err(err) if err.is_conflict() => ("conflict", Err(err)),
                Err(err) => ("failed", Err(err)),
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(tx_id = %tx_id, error = %rollback_err, "rollback failed");
                }
                ("rolled_back", Err(err))
            }
        };

        histogram!("smartfalcon.transaction.duration").record(started.elapsed().as_secs_f64());
        counter!("smartfalcon.transactions.total", "status" => status).increment(1);
        debug!(tx_id = %tx_id, status, "transaction finished");

        result
    }

    // ==================== Operations ====================

    /// Seed the sample dealers that are missing. Returns the ids written.
    pub async fn init_ledger(&self) -> Result<Vec<String>, LedgerError> {
        let seeded = self.atomic(|tx| Box::pin(tx.init_ledger())).await?;

        counter!("smartfalcon.assets.seeded").increment(seeded.len() as u64);
        info!(seeded = ?seeded, "sample dealers seeded");
        Ok(seeded)
    }

    pub async fn asset_exists(&self, dealer_id: &str) -> Result<bool, LedgerError> {
        let dealer_id = dealer_id.to_string();
        self.atomic(move |tx| Box::pin(async move { tx.asset_exists(&dealer_id).await }))
            .await
    }

    pub async fn create_asset(&self, asset: Asset) -> Result<(), LedgerError> {
        self.atomic(move |tx| Box::pin(tx.create_asset(asset)))
            .await
    }

    pub async fn query_asset(&self, dealer_id: &str) -> Result<Asset, LedgerError> {
        let dealer_id = dealer_id.to_string();
        self.atomic(move |tx| Box::pin(async move { tx.query_asset(&dealer_id).await }))
            .await
    }

    pub async fn update_asset(
        &self,
        dealer_id: &str,
        new_balance: i64,
        new_status: &str,
    ) -> Result<(), LedgerError> {
        let dealer_id = dealer_id.to_string();
        let new_status = new_status.to_string();
        self.atomic(move |tx| {
            Box::pin(async move { tx.update_asset(&dealer_id, new_balance, &new_status).await })
        })
        .await
    }

    pub async fn get_transaction_history(&self, dealer_id: &str) -> Result<Vec<String>, LedgerError> {
        let dealer_id = dealer_id.to_string();
        self.atomic(move |tx| {
            Box::pin(async move { tx.get_transaction_history(&dealer_id).await })
        })
        .await
    }

    pub async fn get_asset_history(
        &self,
        dealer_id: &str,
    ) -> Result<Vec<AssetVersion>, LedgerError> {
        let dealer_id = dealer_id.to_string();
        self.atomic(move |tx| Box::pin(async move { tx.get_asset_history(&dealer_id).await }))
            .await
    }
}
