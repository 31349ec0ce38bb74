use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger::{
    HistoryIterator, KeyModification, LedgerError, ReadWriteSet, StateTransaction, WorldState,
    WriteCondition,
};
use sqlx::{
    Row,
    postgres::{PgPool, PgPoolOptions, PgRow},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Postgres world state
///
/// Schema:
/// ```sql
/// CREATE TABLE world_state (
///     key TEXT PRIMARY KEY,
///     value BYTEA NOT NULL,
///     version BIGINT NOT NULL
/// );
///
/// CREATE TABLE world_state_history (
///     seq BIGSERIAL PRIMARY KEY,
///     key TEXT NOT NULL,
///     tx_id UUID NOT NULL,
///     value BYTEA NOT NULL,
///     committed_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// Commit validation locks the rows it checks, so a concurrent committer of
/// the same key either waits or loses on the version check.
///
/// `FOR SHARE` only locks rows that exist. A key that was read as absent and
/// never written by the transaction is checked once and not locked, so a
/// concurrent insert of that key can commit between the check and this
/// transaction's commit. Keys the transaction writes are not affected: their
/// insert-if-absent or version-matched update fails instead.
#[derive(Clone)]
pub struct PostgresWorldState {
    pub(crate) pool: PgPool,
}

impl PostgresWorldState {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<(), LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_state (
                key TEXT PRIMARY KEY,
                value BYTEA NOT NULL,
                version BIGINT NOT NULL CHECK (version > 0)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_state_history (
                seq BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL,
                tx_id UUID NOT NULL,
                value BYTEA NOT NULL,
                committed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_world_state_history_key
            ON world_state_history(key, seq)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl WorldState for PostgresWorldState {
    async fn begin(&self) -> Result<Box<dyn StateTransaction>, LedgerError> {
        Ok(Box::new(PostgresTransaction {
            tx_id: Uuid::now_v7(),
            pool: self.pool.clone(),
            rwset: ReadWriteSet::new(),
        }))
    }
}

struct PostgresTransaction {
    tx_id: Uuid,
    pool: PgPool,
    rwset: ReadWriteSet,
}

#[async_trait]
impl StateTransaction for PostgresTransaction {
    fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(pending) = self.rwset.pending(key) {
            return Ok(Some(pending.to_vec()));
        }

        let row = sqlx::query(
            r#"
            SELECT value, version FROM world_state WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        let Some(row) = row else {
            self.rwset.record_read(key, None);
            return Ok(None);
        };

        let value: Vec<u8> = row
            .try_get("value")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        self.rwset.record_read(key, Some(version as u64));

        Ok(Some(value))
    }

    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.rwset.write(key, value);
        Ok(())
    }

    async fn get_history_for_key(
        &mut self,
        key: &str,
    ) -> Result<Box<dyn HistoryIterator>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT tx_id, value, committed_at
            FROM world_state_history
            WHERE key = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Box::new(PostgresHistoryIterator { rows: rows.into() }))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.rwset.is_read_only() {
            return Ok(());
        }

        // BEGIN; dropping `tx` without COMMIT rolls back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        for (key, observed) in self.rwset.read_only_keys() {
            let current: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT version FROM world_state WHERE key = $1 FOR SHARE
                "#,
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

            if current.map(|v| v as u64) != observed {
                warn!(tx_id = %self.tx_id, key = %key, "read conflict");
                return Err(LedgerError::Conflict(key.to_string()));
            }
        }

        let committed_at = Utc::now();
        for (key, value, condition) in self.rwset.writes() {
            let result = match condition {
                WriteCondition::Absent => {
                    sqlx::query(
                        r#"
                        INSERT INTO world_state (key, value, version)
                        VALUES ($1, $2, 1)
                        ON CONFLICT (key) DO NOTHING
                        "#,
                    )
                    .bind(key)
                    .bind(value)
                    .execute(&mut *tx)
                    .await
                }
                WriteCondition::Version(version) => {
                    sqlx::query(
                        r#"
                        UPDATE world_state
                        SET value = $2, version = version + 1
                        WHERE key = $1 AND version = $3
                        "#,
                    )
                    .bind(key)
                    .bind(value)
                    .bind(version as i64)
                    .execute(&mut *tx)
                    .await
                }
                WriteCondition::Blind => {
                    sqlx::query(
                        r#"
                        INSERT INTO world_state (key, value, version)
                        VALUES ($1, $2, 1)
                        ON CONFLICT (key) DO UPDATE
                        SET value = EXCLUDED.value, version = world_state.version + 1
                        "#,
                    )
                    .bind(key)
                    .bind(value)
                    .execute(&mut *tx)
                    .await
                }
            }
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

            if result.rows_affected() != 1 {
                warn!(tx_id = %self.tx_id, key = %key, ?condition, "write conflict");
                return Err(LedgerError::Conflict(key.to_string()));
            }

            sqlx::query(
                r#"
                INSERT INTO world_state_history (key, tx_id, value, committed_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(key)
            .bind(self.tx_id)
            .bind(value)
            .bind(committed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        debug!(tx_id = %self.tx_id, "postgres transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        debug!(tx_id = %self.tx_id, "postgres transaction rolled back");
        Ok(())
    }
}

struct PostgresHistoryIterator {
    rows: VecDeque<PgRow>,
}

#[async_trait]
impl HistoryIterator for PostgresHistoryIterator {
    async fn next(&mut self) -> Result<Option<KeyModification>, LedgerError> {
        let Some(row) = self.rows.pop_front() else {
            return Ok(None);
        };

        let tx_id: Uuid = row
            .try_get("tx_id")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        let value: Vec<u8> = row
            .try_get("value")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        let timestamp: DateTime<Utc> = row
            .try_get("committed_at")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Some(KeyModification {
            tx_id,
            value,
            timestamp,
        }))
    }

    async fn close(&mut self) {
        self.rows.clear();
    }
}
