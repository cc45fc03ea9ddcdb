//! Indexer configuration.

use alloy::primitives::Address;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SOURCE_ID: &str = "secureVault";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 9;
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DATABASE_URL: &str = "sqlite://vault-indexer.db?mode=rwc";

/// Errors that must stop the process before it starts indexing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not defined")]
    Missing(&'static str),
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
    Other(u64),
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
            Network::Other(id) => *id,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" => Ok(Network::Sepolia),
            other => other
                .parse::<u64>()
                .map(Network::Other)
                .map_err(|_| format!("expected mainnet, sepolia or a chain id, got {other:?}")),
        }
    }
}

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// HTTP RPC URL (eth_getLogs, eth_getBlockByNumber, eth_blockNumber).
    pub rpc_url: String,
    pub network: Network,
    /// Vault contract to watch.
    pub vault_address: Address,
    /// Cursor floor when nothing has been persisted yet.
    pub deployment_block: u64,
    /// Key of the cursor row.
    pub source_id: String,
    pub poll_interval: Duration,
    /// Each eth_getLogs request covers at most `max_chunk_size + 1` blocks.
    pub max_chunk_size: u64,
    /// Blocks behind head that are not scanned yet. 0 trusts every mined block as final.
    pub confirmations: u64,
    pub rpc_timeout: Duration,
    pub database_url: String,
}

impl IndexerConfig {
    /// Minimal config with defaults for everything optional.
    pub fn new(rpc_url: impl Into<String>, vault_address: Address, deployment_block: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            network: Network::Sepolia,
            vault_address,
            deployment_block,
            source_id: DEFAULT_SOURCE_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            confirmations: 0,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let vault_address: Address = parse("VAULT_ADDRESS", required("VAULT_ADDRESS")?)?;
        let deployment_block: u64 = parse("DEPLOYMENT_BLOCK", required("DEPLOYMENT_BLOCK")?)?;
        let rpc_url = required("RPC_URL")?;

        let mut config = Self::new(rpc_url, vault_address, deployment_block);
        config.network = match get("NETWORK") {
            Some(v) => parse("NETWORK", v)?,
            None if get("NODE_ENV").as_deref() == Some("production") => Network::Mainnet,
            None => Network::Sepolia,
        };
        if let Some(v) = get("INDEXER_ID") {
            config.source_id = v;
        }
        if let Some(v) = get("POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse("POLL_INTERVAL_MS", v)?);
        }
        if let Some(v) = get("MAX_CHUNK_SIZE") {
            config.max_chunk_size = parse("MAX_CHUNK_SIZE", v)?;
        }
        if let Some(v) = get("CONFIRMATIONS") {
            config.confirmations = parse("CONFIRMATIONS", v)?;
        }
        if let Some(v) = get("RPC_TIMEOUT_SECS") {
            config.rpc_timeout = Duration::from_secs(parse("RPC_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = get("DATABASE_URL") {
            config.database_url = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CHUNK_SIZE",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
