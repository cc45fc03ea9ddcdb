//! Example: run the vault indexer against an RPC endpoint until Ctrl-C.
//!
//! Usage: VAULT_ADDRESS=0x... DEPLOYMENT_BLOCK=... RPC_URL=... \
//!        cargo run -p vault-indexer --example vault_indexer
//!
//! Other settings (NETWORK, DATABASE_URL, POLL_INTERVAL_MS, MAX_CHUNK_SIZE, CONFIRMATIONS,
//! INDEXER_ID, RPC_TIMEOUT_SECS) are optional; a `.env` file is read if present.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vault_indexer::{
    HttpChainClient, IndexerConfig, PollingScheduler, RangeScanner, ScanConfig, SqlStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    let config = IndexerConfig::from_env().context("invalid configuration")?;
    let chain = HttpChainClient::new(&config.rpc_url, config.rpc_timeout)?;
    chain
        .verify_network(config.network)
        .await
        .context("RPC endpoint does not serve the configured network")?;
    let store = Arc::new(SqlStore::new(&config.database_url).await?);

    let scanner = RangeScanner::new(
        Arc::new(chain),
        store.clone(),
        store,
        ScanConfig::from(&config),
    );
    let scheduler = Arc::new(PollingScheduler::new(scanner, config.poll_interval));
    scheduler
        .start_polling(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
