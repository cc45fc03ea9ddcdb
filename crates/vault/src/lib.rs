//! Off-chain vault runtime: ingestion of vault contract events into a queryable event log.
//!
//! - **RangeScanner**: one resumable ingestion cycle. Scans `(cursor, head]` in bounded
//!   chunks, stores each chunk's events by transaction hash (first write wins) and only then
//!   advances the persisted cursor.
//! - **PollingScheduler**: runs a backfill cycle at startup and one cycle per interval
//!   tick, never two at once.
//! - **Stores**: [CursorStore] and [EventStore] contracts with in-memory and SQL
//!   ([SqlStore], SQLite or Postgres) implementations, plus the wallet history read side.
//!
//! Queried blocks are trusted as final unless a confirmation depth is configured; there is
//! no reorg handling.

pub mod abi;
pub mod chain;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod timestamps;

pub use abi::{decode_vault_log, RawLog, VaultLog};
pub use chain::{ChainClient, ChainError, HttpChainClient};
pub use classify::{classify, EventType, VaultEvent};
pub use config::{ConfigError, IndexerConfig, Network};
pub use cursor::{BlockRange, Cursor};
pub use scanner::{CycleError, CycleOutcome, RangeReport, RangeScanner, ScanConfig, ScanStats};
pub use scheduler::PollingScheduler;
pub use store::{CursorStore, EventQuery, EventStore, MemoryStore, SqlStore, StoreError};
pub use timestamps::BlockTimestamps;
