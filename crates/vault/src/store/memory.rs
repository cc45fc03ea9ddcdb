use super::{sort_newest_first, CursorStore, EventQuery, EventStore, StoreError};
use crate::classify::VaultEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-process store implementing both contracts. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cursors: Mutex<HashMap<String, u64>>,
    events: Mutex<EventLog>,
}

#[derive(Debug, Default)]
struct EventLog {
    seen: HashSet<String>,
    // Insertion order is kept so tests can observe write order.
    ordered: Vec<VaultEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored events in insertion order.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).ordered.clone()
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<u64>, StoreError> {
        let cursors = self.cursors.lock().unwrap_or_else(|p| p.into_inner());
        Ok(cursors.get(source_id).copied())
    }

    async fn advance_cursor(&self, source_id: &str, to_block: u64) -> Result<(), StoreError> {
        let mut cursors = self.cursors.lock().unwrap_or_else(|p| p.into_inner());
        cursors.insert(source_id.to_string(), to_block);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn upsert_event(&self, event: &VaultEvent) -> Result<bool, StoreError> {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        if !events.seen.insert(event.tx_hash.clone()) {
            return Ok(false);
        }
        events.ordered.push(event.clone());
        Ok(true)
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<VaultEvent>, StoreError> {
        let events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<VaultEvent> = events.ordered.iter().filter(|e| query.matches(e)).cloned().collect();
        sort_newest_first(&mut out);
        Ok(out)
    }
}
