use super::{CursorStore, EventQuery, EventStore, StoreError};
use crate::classify::{EventType, VaultEvent};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{
    any::{install_default_drivers, AnyConnectOptions, AnyPoolOptions, AnyRow},
    AnyPool, Row,
};
use std::str::FromStr;

/// SQL-backed store over `sqlx`'s `Any` driver.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    /// For SQLite use a `sqlite:file_path` URL; for Postgres `postgres://`.
    /// Embedded migrations are applied before returning.
    pub async fn new(conn_str: &str) -> Result<Self, StoreError> {
        install_default_drivers();
        let opts = AnyConnectOptions::from_str(conn_str)?;
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn to_sql_block(block: u64) -> Result<i64, StoreError> {
    i64::try_from(block).map_err(|_| StoreError::BadBlockNumber(block.to_string()))
}

fn from_sql_block(block: i64) -> Result<u64, StoreError> {
    u64::try_from(block).map_err(|_| StoreError::BadBlockNumber(block.to_string()))
}

fn event_from_row(row: &AnyRow) -> Result<VaultEvent, StoreError> {
    let event_type: String = row.try_get("event_type")?;
    let ts: i64 = row.try_get("block_timestamp")?;
    Ok(VaultEvent {
        tx_hash: row.try_get("tx_hash")?,
        wallet_address: row.try_get("wallet_address")?,
        event_type: EventType::from_str(&event_type).map_err(StoreError::BadRecord)?,
        amount: row.try_get("amount")?,
        block_number: from_sql_block(row.try_get("block_number")?)?,
        timestamp: DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| StoreError::BadRecord(format!("timestamp {ts}")))?,
    })
}

#[async_trait]
impl CursorStore for SqlStore {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<u64>, StoreError> {
        let res = sqlx::query("SELECT last_block FROM indexer_state WHERE source_id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = res else {
            return Ok(None);
        };
        Ok(Some(from_sql_block(row.try_get("last_block")?)?))
    }

    async fn advance_cursor(&self, source_id: &str, to_block: u64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO indexer_state (source_id, last_block) VALUES ($1, $2)
             ON CONFLICT (source_id) DO UPDATE SET last_block = EXCLUDED.last_block",
        )
        .bind(source_id)
        .bind(to_sql_block(to_block)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for SqlStore {
    async fn upsert_event(&self, event: &VaultEvent) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "INSERT INTO vault_events (
                tx_hash,
                wallet_address,
                event_type,
                amount,
                block_number,
                block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tx_hash) DO NOTHING",
        )
        .bind(event.tx_hash.as_str())
        .bind(event.wallet_address.as_str())
        .bind(event.event_type.as_str())
        .bind(event.amount.as_str())
        .bind(to_sql_block(event.block_number)?)
        .bind(event.timestamp.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<VaultEvent>, StoreError> {
        let mut sql = String::from(
            "SELECT tx_hash, wallet_address, event_type, amount, block_number, block_timestamp
             FROM vault_events WHERE wallet_address = $1",
        );
        let types = query.event_types.as_deref().unwrap_or_default();
        if query.event_types.is_some() {
            let placeholders: Vec<String> = (0..types.len()).map(|i| format!("${}", i + 2)).collect();
            if placeholders.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND event_type IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY block_timestamp DESC, block_number DESC");

        let mut q = sqlx::query(&sql).bind(query.wallet_address.as_str());
        for ty in types {
            q = q.bind(ty.as_str());
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }
}
