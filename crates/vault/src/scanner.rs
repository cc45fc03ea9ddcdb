//! RangeScanner: one ingestion cycle over the vault's logs.
//!
//! Reads the persisted cursor, splits `(cursor, head]` into chunks of at most
//! `max_chunk_size + 1` blocks and, for each chunk in ascending order, fetches logs,
//! attaches block timestamps, classifies and upserts them, then advances the cursor.
//! The cursor moves only after every log of a chunk is stored, so a failure anywhere
//! in a chunk leaves it to be rescanned in full by the next cycle. Upserts are keyed
//! by transaction hash, which makes rescans harmless.

use crate::abi::{decode_vault_log, hex_b256, vault_event_topics, DecodeError};
use crate::chain::{ChainClient, ChainError};
use crate::classify::{classify, VaultEvent};
use crate::config::IndexerConfig;
use crate::cursor::{BlockRange, Cursor};
use crate::store::{CursorObj, EventObj, StoreError};
use crate::timestamps::BlockTimestamps;
use alloy::primitives::Address;
use std::sync::Arc;
use thiserror::Error;

/// Scanner parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub source_id: String,
    pub vault_address: Address,
    pub deployment_block: u64,
    pub max_chunk_size: u64,
    pub confirmations: u64,
}

impl From<&IndexerConfig> for ScanConfig {
    fn from(c: &IndexerConfig) -> Self {
        Self {
            source_id: c.source_id.clone(),
            vault_address: c.vault_address,
            deployment_block: c.deployment_block,
            max_chunk_size: c.max_chunk_size,
            confirmations: c.confirmations,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    #[error("storage: {0}")]
    Store(#[from] StoreError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
}

impl CycleError {
    /// Short stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Chain(_) => "chain_unavailable",
            CycleError::Store(_) => "storage",
            CycleError::Decode(_) => "decode",
        }
    }
}

/// Counters for one chunk or an entire cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub logs: usize,
    /// New rows written.
    pub inserted: usize,
    /// Rows that already existed (rescanned range).
    pub duplicates: usize,
    /// Logs without a block number or transaction hash.
    pub skipped: usize,
}

impl ScanStats {
    fn add(&mut self, other: ScanStats) {
        self.logs += other.logs;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
    }
}

/// Range covered by a cycle that advanced the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeReport {
    pub from_block: u64,
    pub to_block: u64,
    pub chunks: usize,
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cursor already at (or past) the scan target.
    UpToDate { last_block: u64, head: u64 },
    Advanced(RangeReport),
}

/// Scanner over one vault contract. Sole writer of its cursor row and of vault events.
pub struct RangeScanner {
    chain: Arc<dyn ChainClient>,
    cursors: CursorObj,
    events: EventObj,
    config: ScanConfig,
}

impl RangeScanner {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        cursors: CursorObj,
        events: EventObj,
        config: ScanConfig,
    ) -> Self {
        Self {
            chain,
            cursors,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Persisted cursor, or the deployment block when none exists yet.
    pub async fn cursor(&self) -> Result<Cursor, StoreError> {
        let last = self
            .cursors
            .read_cursor(&self.config.source_id)
            .await?
            .unwrap_or(self.config.deployment_block);
        Ok(Cursor::new(self.config.source_id.clone(), last))
    }

    /// Run one cycle until the cursor reaches the scan target or an error stops it.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let mut cursor = self.cursor().await?;
        let head = self
            .chain
            .get_head_block_number()
            .await?
            .saturating_sub(self.config.confirmations);
        if head <= cursor.last_block {
            return Ok(CycleOutcome::UpToDate {
                last_block: cursor.last_block,
                head,
            });
        }

        tracing::info!(from = cursor.last_block + 1, to = head, "scanning vault logs");
        let start = cursor.last_block + 1;
        let mut chunks = 0;
        let mut stats = ScanStats::default();
        while let Some(range) = cursor.next_range(head, self.config.max_chunk_size) {
            let chunk_stats = self.process_chunk(range).await?;
            self.cursors
                .advance_cursor(&self.config.source_id, range.to)
                .await?;
            cursor.last_block = range.to;
            chunks += 1;
            stats.add(chunk_stats);
            tracing::debug!(
                from = range.from,
                to = range.to,
                logs = chunk_stats.logs,
                inserted = chunk_stats.inserted,
                "chunk persisted, cursor advanced"
            );
        }

        Ok(CycleOutcome::Advanced(RangeReport {
            from_block: start,
            to_block: cursor.last_block,
            chunks,
            stats,
        }))
    }

    /// Fetch, classify and store every log of `range`. Does not touch the cursor.
    pub async fn process_chunk(&self, range: BlockRange) -> Result<ScanStats, CycleError> {
        let mut logs = self
            .chain
            .get_logs(
                self.config.vault_address,
                vault_event_topics(),
                range.from,
                range.to,
            )
            .await?;
        // Chain order: ascending block, then log index.
        logs.sort_by_cached_key(|log| (log.block_number(), log.log_index()));
        let mut timestamps = BlockTimestamps::new(self.chain.as_ref());
        let mut stats = ScanStats {
            logs: logs.len(),
            ..Default::default()
        };

        for log in &logs {
            let (Some(block_number), Some(tx_hash)) = (log.block_number(), log.transaction_hash())
            else {
                tracing::debug!(
                    block_number = ?log.block_number,
                    tx_hash = ?log.transaction_hash,
                    "log without block/tx, skipped"
                );
                stats.skipped += 1;
                continue;
            };
            let decoded = decode_vault_log(log)?;
            let timestamp = timestamps.get_or_fetch(block_number).await?;
            let event = VaultEvent::new(hex_b256(&tx_hash), block_number, timestamp, classify(&decoded));
            if self.events.upsert_event(&event).await? {
                stats.inserted += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        Ok(stats)
    }
}
