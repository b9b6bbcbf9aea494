//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod config;
mod logging;

use std::{process, sync::Arc};

use cache_client::{Cache, CacheClient};
use chain_gateway::{ChainGateway, EthersChainGateway};
use clap::Parser;
use config::AppConfig;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Provider, Ws},
    signers::{LocalWallet, Signer},
};
use log::*;
use settler::{EthersTxBroadcaster, Settler, TxBroadcaster};
use stat_store::{Migratable, PgStatStore, StatStore};
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "global_indexer::settler::app";

/// The `settler` named service: a single-leader control loop that detects
/// epoch transitions and submits on-chain settlement transactions
/// (`SPEC_FULL.md` §4.J).
#[derive(Parser, Debug)]
#[command(name = "settler", about = "Global Indexer epoch settler")]
struct Cli {
    /// Path to a layered configuration file (TOML/YAML/JSON).
    #[arg(long, env = "GI_CONFIG")]
    config: Option<String>,

    /// Path to a log4rs YAML file; falls back to the embedded default.
    #[arg(long, env = "GI_LOG_CONFIG")]
    log_config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::initialize_logging(cli.log_config.as_deref()) {
        eprintln!("failed to initialize logging: {err:?}");
        process::exit(1);
    }

    if let Err(err) = run(cli) {
        error!(target: LOG_TARGET, "settler exited with an error: {err:?}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run_settler(config))
}

async fn run_settler(config: AppConfig) -> anyhow::Result<()> {
    let cache: Arc<dyn Cache> = Arc::new(CacheClient::new(&config.redis_url)?);

    let stat_store: Arc<dyn StatStore> = {
        let store = PgStatStore::new(&config.database_url)?;
        store.migrate()?;
        Arc::new(store)
    };

    let provider = Provider::<Ws>::connect(&config.chain_rpc_ws_url).await?;
    let wallet: LocalWallet = config.signer_private_key.parse()?;
    let wallet = wallet.with_chain_id(config.chain_id_l2);
    let signer = Arc::new(SignerMiddleware::new(provider.clone(), wallet));

    let contract_address = config.settlement_contract_address.parse()?;
    let chain: Arc<dyn ChainGateway> = Arc::new(EthersChainGateway::new(
        Arc::new(provider),
        contract_address,
        config.genesis_epoch_map_by_chain_id(),
    ));
    let tx_broadcaster: Arc<dyn TxBroadcaster> = Arc::new(EthersTxBroadcaster::new(signer, contract_address));

    let settler = Settler::new(
        cache,
        stat_store,
        chain,
        tx_broadcaster,
        config.chain_id_l2,
        std::time::Duration::from_secs(config.settler.epoch_interval_in_hours * 3600),
        std::time::Duration::from_secs(config.settler.lock_ttl_secs),
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target: LOG_TARGET, "failed to install ctrl-c handler: {err}");
            return;
        }
        info!(target: LOG_TARGET, "shutdown signal received");
        shutdown_signal.cancel();
    });

    info!(target: LOG_TARGET, "settler starting on chain {}", config.chain_id_l2);
    settler.run(shutdown).await?;
    info!(target: LOG_TARGET, "settler stopped");
    Ok(())
}
