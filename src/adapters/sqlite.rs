use std::collections::VecDeque;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger::{
    HistoryIterator, KeyModification, LedgerError, ReadWriteSet, StateTransaction, WorldState,
    WriteCondition,
};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// SQLite world state
///
/// Schema:
/// ```sql
/// CREATE TABLE world_state (
///     key TEXT PRIMARY KEY,
///     value BLOB NOT NULL,
///     version INTEGER NOT NULL
/// );
///
/// CREATE TABLE world_state_history (
///     seq INTEGER PRIMARY KEY AUTOINCREMENT,
///     key TEXT NOT NULL,
///     tx_id BLOB NOT NULL,
///     value BLOB NOT NULL,
///     committed_at TEXT NOT NULL
/// );
///
/// CREATE INDEX idx_world_state_history_key ON world_state_history(key, seq);
/// ```
#[derive(Clone)]
pub struct SqliteWorldState {
    pub(crate) pool: SqlitePool,
}

impl SqliteWorldState {
    /// Create a new SQLite world state with a file-based database
    pub async fn new_file(path: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new SQLite world state with an in-memory database
    pub async fn new_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Connect from a `sqlite:` URL, creating the file if needed
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        // Each connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
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
                value BLOB NOT NULL,
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_state_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                tx_id BLOB NOT NULL,
                value BLOB NOT NULL,
                committed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_world_state_history_key ON world_state_history(key, seq)
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
impl WorldState for SqliteWorldState {
    async fn begin(&self) -> Result<Box<dyn StateTransaction>, LedgerError> {
        Ok(Box::new(SqliteTransaction {
            tx_id: Uuid::now_v7(),
            pool: self.pool.clone(),
            rwset: ReadWriteSet::new(),
        }))
    }
}

struct SqliteTransaction {
    tx_id: Uuid,
    pool: SqlitePool,
    rwset: ReadWriteSet,
}

#[async_trait]
impl StateTransaction for SqliteTransaction {
    fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(pending) = self.rwset.pending(key) {
            return Ok(Some(pending.to_vec()));
        }

        let row = sqlx::query(
            r#"
            SELECT value, version FROM world_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        match row {
            Some(row) => {
                let value: Vec<u8> = row
                    .try_get("value")
                    .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
                self.rwset.record_read(key, Some(version as u64));
                Ok(Some(value))
            }
            None => {
                self.rwset.record_read(key, None);
                Ok(None)
            }
        }
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
            WHERE key = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(Box::new(SqliteHistoryIterator { rows: rows.into() }))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.rwset.is_read_only() {
            return Ok(());
        }

        // Dropping `tx` on an early return rolls it back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

        for (key, observed) in self.rwset.read_only_keys() {
            let current: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT version FROM world_state WHERE key = ?
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
                        VALUES (?, ?, 1)
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
                        SET value = ?, version = version + 1
                        WHERE key = ? AND version = ?
                        "#,
                    )
                    .bind(value)
                    .bind(key)
                    .bind(version as i64)
                    .execute(&mut *tx)
                    .await
                }
                WriteCondition::Blind => {
                    sqlx::query(
                        r#"
                        INSERT INTO world_state (key, value, version)
                        VALUES (?, ?, 1)
                        ON CONFLICT (key) DO UPDATE
                        SET value = excluded.value, version = world_state.version + 1
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
                VALUES (?, ?, ?, ?)
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

        debug!(tx_id = %self.tx_id, "sqlite transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        debug!(tx_id = %self.tx_id, "sqlite transaction rolled back");
        Ok(())
    }
}

struct SqliteHistoryIterator {
    rows: VecDeque<SqliteRow>,
}

impl SqliteHistoryIterator {
    fn modification(row: &SqliteRow) -> Result<KeyModification, LedgerError> {
        let tx_id: Uuid = row
            .try_get("tx_id")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        let value: Vec<u8> = row
            .try_get("value")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;
        let timestamp: DateTime<Utc> = row
            .try_get("committed_at")
            .map_err(|e| LedgerError::StoreRead(e.to_string()))?;

        Ok(KeyModification {
            tx_id,
            value,
            timestamp,
        })
    }
}

#[async_trait]
impl HistoryIterator for SqliteHistoryIterator {
    async fn next(&mut self) -> Result<Option<KeyModification>, LedgerError> {
        self.rows
            .pop_front()
            .map(|row| Self::modification(&row))
            .transpose()
    }

    async fn close(&mut self) {
        self.rows.clear();
    }
}
