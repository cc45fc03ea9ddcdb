//! Persistence contracts for the cursor and the vault event log.
//!
//! The scanner is the only writer. Read queries ([EventQuery]) serve the history,
//! deposits and withdrawals views.

use crate::classify::{EventType, VaultEvent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("SQL migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid block number: {0}")]
    BadBlockNumber(String),

    #[error("invalid record: {0}")]
    BadRecord(String),
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<u64>, StoreError>;

    /// Set the cursor to `to_block`. Callers only advance after the range is persisted.
    async fn advance_cursor(&self, source_id: &str, to_block: u64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert unless a row with the same `tx_hash` exists; an existing row is left untouched.
    /// Returns `true` when a new row was written.
    async fn upsert_event(&self, event: &VaultEvent) -> Result<bool, StoreError>;

    /// Events matching `query`, newest first.
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<VaultEvent>, StoreError>;
}

pub type CursorObj = Arc<dyn CursorStore>;
pub type EventObj = Arc<dyn EventStore>;

/// Read-side filter over the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Lower-cased wallet address.
    pub wallet_address: String,
    /// Restrict to these types; `None` returns every type.
    pub event_types: Option<Vec<EventType>>,
}

impl EventQuery {
    /// Full history of one wallet.
    pub fn history(wallet: &str) -> Self {
        Self {
            wallet_address: wallet.to_lowercase(),
            event_types: None,
        }
    }

    pub fn deposits(wallet: &str) -> Self {
        Self {
            wallet_address: wallet.to_lowercase(),
            event_types: Some(vec![EventType::Deposit]),
        }
    }

    /// Every withdrawal lifecycle event: request, modification, cancellation, execution.
    pub fn withdrawals(wallet: &str) -> Self {
        Self {
            wallet_address: wallet.to_lowercase(),
            event_types: Some(EventType::WITHDRAWALS.to_vec()),
        }
    }

    pub fn matches(&self, event: &VaultEvent) -> bool {
        event.wallet_address == self.wallet_address
            && self
                .event_types
                .as_ref()
                .map_or(true, |types| types.contains(&event.event_type))
    }
}

/// Newest first; block number breaks timestamp ties.
pub(crate) fn sort_newest_first(events: &mut [VaultEvent]) {
    events.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.block_number.cmp(&a.block_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn event(ty: EventType, wallet: &str) -> VaultEvent {
        VaultEvent {
            tx_hash: "0x01".into(),
            wallet_address: wallet.into(),
            event_type: ty,
            amount: "1".into(),
            block_number: 1,
            timestamp: DateTime::from_timestamp(1, 0).unwrap(),
        }
    }

    #[test]
    fn queries_lowercase_the_wallet() {
        let q = EventQuery::deposits("0xABCD");
        assert_eq!(q.wallet_address, "0xabcd");
        assert!(q.matches(&event(EventType::Deposit, "0xabcd")));
        assert!(!q.matches(&event(EventType::WithdrawRequest, "0xabcd")));
        assert!(!q.matches(&event(EventType::Deposit, "0xother")));
    }

    #[test]
    fn withdrawals_cover_the_whole_lifecycle() {
        let q = EventQuery::withdrawals("0xabcd");
        for ty in EventType::WITHDRAWALS {
            assert!(q.matches(&event(ty, "0xabcd")));
        }
        assert!(!q.matches(&event(EventType::Deposit, "0xabcd")));
        assert!(EventQuery::history("0xabcd").matches(&event(EventType::Unknown, "0xabcd")));
    }
}
