//! Block timestamp memoization for a single chunk.
//!
//! Several logs usually share a block; one `eth_getBlockByNumber` per block is enough.
//! A cache is created per chunk and dropped with it, chain data is never kept across cycles.

use crate::chain::{ChainClient, ChainError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub struct BlockTimestamps<'a> {
    chain: &'a dyn ChainClient,
    cache: HashMap<u64, DateTime<Utc>>,
    fetches: usize,
}

impl<'a> BlockTimestamps<'a> {
    pub fn new(chain: &'a dyn ChainClient) -> Self {
        Self {
            chain,
            cache: HashMap::new(),
            fetches: 0,
        }
    }

    pub async fn get_or_fetch(&mut self, block_number: u64) -> Result<DateTime<Utc>, ChainError> {
        if let Some(ts) = self.cache.get(&block_number) {
            return Ok(*ts);
        }
        let ts = self.chain.get_block_timestamp(block_number).await?;
        self.fetches += 1;
        self.cache.insert(block_number, ts);
        Ok(ts)
    }

    /// Number of RPC lookups performed so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}
