//! Common helpers for integration tests.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tracing_subscriber::EnvFilter;
use vault_indexer::abi::{event_topic, hex_b256, vault_event_topics};
use vault_indexer::{
    ChainClient, ChainError, CursorStore, MemoryStore, RangeScanner, RawLog, ScanConfig,
    StoreError,
};

pub const VAULT: Address = Address::repeat_byte(0x5f);
pub const SOURCE: &str = "secureVault";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("vault_indexer=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

/// Block timestamp used by [MockChain]: 12 s slots from a fixed genesis.
pub fn block_time(block: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + block as i64 * 12, 0).unwrap()
}

pub fn tx(n: u8) -> B256 {
    B256::repeat_byte(n)
}

fn word(v: u64) -> String {
    hex::encode(U256::from(v).to_be_bytes::<32>())
}

fn log(block: u64, tx_hash: B256, index: usize, user: Address, data: String) -> RawLog {
    RawLog {
        address: Some(format!("0x{}", hex::encode(VAULT))),
        topics: vec![
            hex_b256(&vault_event_topics()[index]),
            hex_b256(&user.into_word()),
        ],
        data,
        block_number: Some(format!("0x{:x}", block)),
        transaction_hash: Some(hex_b256(&tx_hash)),
        log_index: Some("0x0".into()),
    }
}

pub fn deposit(block: u64, tx_hash: B256, user: Address, amount: u64) -> RawLog {
    log(block, tx_hash, 0, user, format!("0x{}", word(amount)))
}

pub fn request_withdrawal(block: u64, tx_hash: B256, user: Address, amount: u64) -> RawLog {
    log(block, tx_hash, 1, user, format!("0x{}{}", word(amount), word(1_700_000_000)))
}

pub fn withdrawn(block: u64, tx_hash: B256, user: Address, amount: u64) -> RawLog {
    log(block, tx_hash, 2, user, format!("0x{}", word(amount)))
}

pub fn modify_withdrawal(block: u64, tx_hash: B256, user: Address, previous: u64, new: u64) -> RawLog {
    log(block, tx_hash, 3, user, format!("0x{}{}", word(previous), word(new)))
}

pub fn cancel_withdrawal(block: u64, tx_hash: B256, user: Address) -> RawLog {
    log(block, tx_hash, 4, user, "0x".into())
}

pub fn unknown_event(block: u64, tx_hash: B256) -> RawLog {
    RawLog {
        topics: vec![hex_b256(&event_topic("Paused(address)"))],
        data: "0x".into(),
        block_number: Some(format!("0x{:x}", block)),
        transaction_hash: Some(hex_b256(&tx_hash)),
        ..Default::default()
    }
}

/// Scripted chain: a fixed set of logs, a settable head, and a record of every query.
pub struct MockChain {
    head: AtomicU64,
    /// Logs with the block whose range query returns them.
    logs: Mutex<Vec<(u64, RawLog)>>,
    queries: Mutex<Vec<(u64, u64)>>,
    timestamp_calls: AtomicUsize,
    /// `eth_getLogs` fails once for a query starting at this block.
    fail_logs_from: Mutex<Option<u64>>,
    fail_head: AtomicBool,
    gated: AtomicBool,
    /// Notified when a gated head query starts.
    pub entered: Notify,
    release: Semaphore,
}

impl MockChain {
    pub fn new(head: u64, logs: Vec<RawLog>) -> Arc<Self> {
        let logs = logs
            .into_iter()
            .map(|l| (l.block_number().unwrap_or_default(), l))
            .collect();
        Arc::new(Self {
            head: AtomicU64::new(head),
            logs: Mutex::new(logs),
            queries: Mutex::new(Vec::new()),
            timestamp_calls: AtomicUsize::new(0),
            fail_logs_from: Mutex::new(None),
            fail_head: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: RawLog) {
        let block = log.block_number().unwrap_or_default();
        self.logs.lock().unwrap().push((block, log));
    }

    /// Add a log lacking block number or tx hash, returned by the query covering `block`.
    pub fn push_unkeyed(&self, block: u64, log: RawLog) {
        self.logs.lock().unwrap().push((block, log));
    }

    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn clear_queries(&self) {
        self.queries.lock().unwrap().clear();
    }

    pub fn timestamp_calls(&self) -> usize {
        self.timestamp_calls.load(Ordering::SeqCst)
    }

    pub fn fail_logs_once_from(&self, block: u64) {
        *self.fail_logs_from.lock().unwrap() = Some(block);
    }

    pub fn set_fail_head(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::SeqCst);
    }

    /// Hold every head query until [MockChain::open_gate] is called.
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.release.add_permits(1024);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_logs(
        &self,
        _address: Address,
        _topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainError> {
        self.queries.lock().unwrap().push((from_block, to_block));
        {
            let mut fail = self.fail_logs_from.lock().unwrap();
            if *fail == Some(from_block) {
                *fail = None;
                return Err(ChainError::Unavailable("connection reset".into()));
            }
        }
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|(b, _)| (from_block..=to_block).contains(b))
            .map(|(_, l)| l.clone())
            .collect())
    }

    async fn get_block_timestamp(&self, block_number: u64) -> Result<DateTime<Utc>, ChainError> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
        Ok(block_time(block_number))
    }

    async fn get_head_block_number(&self) -> Result<u64, ChainError> {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            let permit = self
                .release
                .acquire()
                .await
                .map_err(|e| ChainError::Unavailable(e.to_string()))?;
            permit.forget();
        }
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("eth_blockNumber timed out".into()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }
}

/// Cursor store that records every advance and can fail one advance on demand.
#[derive(Default)]
pub struct RecordingCursor {
    inner: MemoryStore,
    advances: Mutex<Vec<u64>>,
    fail_advance_to: Mutex<Option<u64>>,
}

impl RecordingCursor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advances(&self) -> Vec<u64> {
        self.advances.lock().unwrap().clone()
    }

    /// The next advance to `block` fails as if the process died before committing it.
    pub fn fail_advance_once_to(&self, block: u64) {
        *self.fail_advance_to.lock().unwrap() = Some(block);
    }
}

#[async_trait]
impl CursorStore for RecordingCursor {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<u64>, StoreError> {
        self.inner.read_cursor(source_id).await
    }

    async fn advance_cursor(&self, source_id: &str, to_block: u64) -> Result<(), StoreError> {
        {
            let mut fail = self.fail_advance_to.lock().unwrap();
            if *fail == Some(to_block) {
                *fail = None;
                return Err(StoreError::BadRecord("simulated crash before cursor commit".into()));
            }
        }
        self.advances.lock().unwrap().push(to_block);
        self.inner.advance_cursor(source_id, to_block).await
    }
}

pub fn scan_config(deployment_block: u64, max_chunk_size: u64) -> ScanConfig {
    ScanConfig {
        source_id: SOURCE.to_string(),
        vault_address: VAULT,
        deployment_block,
        max_chunk_size,
        confirmations: 0,
    }
}

pub fn scanner(
    chain: &Arc<MockChain>,
    cursor: &Arc<RecordingCursor>,
    events: &Arc<MemoryStore>,
    config: ScanConfig,
) -> RangeScanner {
    RangeScanner::new(chain.clone(), cursor.clone(), events.clone(), config)
}
