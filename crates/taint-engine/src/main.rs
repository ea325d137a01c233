mod cli;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use taint_core::rpc::{ChainInfo, HttpNodeClient, NodeClient};
use taint_core::{QueryService, Scanner, SeedBuilder, SeedHeights, TaintStore};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let node = match HttpNodeClient::new(
        &args.node_url(),
        args.node_user.as_deref(),
        args.node_pass.as_deref(),
        args.node_cookie_file.as_deref(),
        args.node_max_parallel as usize,
        std::time::Duration::from_millis(args.node_timeout_ms),
        args.retry_policy(),
    ) {
        Ok(node) => Arc::new(node),
        Err(err) => {
            error!(error = %err, "invalid node configuration");
            return ExitCode::from(1);
        }
    };

    let chain_info = match node.chain_info().await {
        Ok(info) => info,
        Err(taint_core::RpcError::NodeSyncing { progress }) => {
            error!(progress, "node is still in initial block download");
            return ExitCode::from(3);
        }
        Err(err) => {
            error!(error = %err, "could not reach bitcoin core");
            return ExitCode::from(2);
        }
    };
    let network = chain_network(&chain_info);
    info!(chain = %chain_info.chain, blocks = chain_info.blocks, "connected to bitcoin core");

    let store = match TaintStore::open(&args.store_base_path) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, path = %args.store_base_path.display(), "taint store is unavailable or corrupted");
            return ExitCode::from(4);
        }
    };

    let seed_builder = SeedBuilder::new(node.as_ref(), &store, network, SeedHeights::bundled());
    if let Err(err) = seed_builder.run().await {
        error!(error = %err, "seed materialization failed");
        return ExitCode::from(4);
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let scanner = Arc::new(Scanner::new(
        node.clone(),
        store.clone(),
        args.scanner_config(network),
    ));
    let status = scanner.status_handle();

    let scanner_task = if args.scanner_enabled {
        let scanner = scanner.clone();
        Some(tokio::spawn(async move { scanner.run(stop_rx).await }))
    } else {
        warn!("scanner.enabled is false; serving query results from the existing store only");
        None
    };

    let query_service = QueryService::new(store, args.query_timeout());
    let config = server::ConfigSummary {
        chunk_size_blocks: args.scanner_chunk_size_blocks,
        batch_size: args.scanner_batch_size,
        idle_interval_ms: args.scanner_idle_interval_ms,
        parent_cache_max: args.scanner_parent_cache_max,
        query_timeout_ms: args.query_timeout_ms,
    };
    let state = server::AppState {
        query: query_service,
        status,
        config,
    };
    let router = server::build_router(state);

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, %bind_addr, "failed to bind http listener");
            let _ = stop_tx.send(true);
            return ExitCode::from(1);
        }
    };
    info!(%bind_addr, "listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = stop_tx.send(true);
    if let Some(task) = scanner_task {
        let _ = task.await;
    }

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "http server terminated with an error");
            ExitCode::from(1)
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn chain_network(info: &ChainInfo) -> bitcoin::Network {
    match info.chain.as_str() {
        "test" => bitcoin::Network::Testnet,
        "regtest" => bitcoin::Network::Regtest,
        "signet" => bitcoin::Network::Signet,
        _ => bitcoin::Network::Bitcoin,
    }
}
