// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strand Node
//!
//! Entry point for the `strand-node` binary. Parses CLI arguments,
//! initializes logging, opens the chain in the data directory, and runs one
//! subcommand:
//!
//! - `add`      — append a block
//! - `get`      — print a block
//! - `height`   — print the current height
//! - `validate` — check one block or the whole chain
//! - `dump`     — print every block in order
//! - `reset`    — delete every block
//! - `serve`    — HTTP API plus Prometheus metrics
//! - `version`  — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

use strand_protocol::config::ChainConfig;
use strand_protocol::storage::{stored_algorithm, Block, ChainManager, SledStore};

use api::NodeChain;
use cli::{Commands, GlobalArgs, StrandNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = StrandNodeCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_logging(&cli.global.log_level, cli.global.log_format);
    let chain = open_chain(&cli.global, cli.command.creates_genesis())?;

    match cli.command {
        Commands::Add(args) => add_block(&chain, args),
        Commands::Get(args) => print_block(&chain, args.height),
        Commands::Height => {
            println!("{}", chain.current_height());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate(args) => validate(&chain, args.height),
        Commands::Dump => dump_chain(&chain),
        Commands::Reset(args) => reset_chain(&chain, args.yes),
        Commands::Serve(args) => serve(Arc::new(chain), args).await,
        Commands::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Opens the sled database in the data directory and the chain over it.
///
/// Genesis is appended only when `create_genesis` is set and `--no-genesis`
/// was not given.
fn open_chain(global: &GlobalArgs, create_genesis: bool) -> Result<NodeChain> {
    let data_dir = &global.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let store = SledStore::open(data_dir)
        .with_context(|| format!("failed to open database at {}", data_dir.display()))?;

    let config = chain_config(global, &store, create_genesis)?;
    let chain = ChainManager::open(Arc::new(store), &config)
        .with_context(|| format!("failed to open chain at {}", data_dir.display()))?;

    tracing::info!(
        data_dir = %data_dir.display(),
        height = chain.current_height(),
        algorithm = %chain.algorithm(),
        "chain ready"
    );
    Ok(chain)
}

/// Builds the chain config, taking the hash algorithm from `--hash` if
/// given, else from the store, else the default.
fn chain_config(global: &GlobalArgs, store: &SledStore, create_genesis: bool) -> Result<ChainConfig> {
    let hash_algorithm = match global.hash_algorithm {
        Some(algorithm) => algorithm,
        None => stored_algorithm(store)
            .context("failed to read the chain's hash algorithm")?
            .unwrap_or_default(),
    };

    Ok(ChainConfig {
        hash_algorithm,
        ensure_genesis: create_genesis && !global.no_genesis,
    })
}

fn add_block(chain: &NodeChain, args: cli::AddArgs) -> Result<ExitCode> {
    let body = if args.json {
        serde_json::from_str(&args.body).context("block body is not valid JSON")?
    } else {
        serde_json::Value::String(args.body)
    };

    let block = chain
        .append(Block::new(body))
        .context("failed to append block")?;
    println!("{} {}", block.height, block.hash);
    Ok(ExitCode::SUCCESS)
}

fn print_block(chain: &NodeChain, height: u64) -> Result<ExitCode> {
    let block = chain.get_block(height)?;
    println!("{}", serde_json::to_string_pretty(&block)?);
    Ok(ExitCode::SUCCESS)
}

/// Validates one block or the whole chain. Exit status 1 on any failure.
fn validate(chain: &NodeChain, height: Option<u64>) -> Result<ExitCode> {
    let valid = match height {
        Some(height) => {
            let result = chain.validate_block(height);
            if result.valid {
                println!("Block #{height} is valid");
            } else {
                println!("Block #{height} is invalid");
            }
            result.valid
        }
        None => {
            let invalid = chain.validate_chain();
            if invalid.is_empty() {
                println!("No errors detected");
            } else {
                println!("Block errors = {}", invalid.len());
                let heights: Vec<String> = invalid.iter().map(u64::to_string).collect();
                println!("Blocks: [{}]", heights.join(", "));
            }
            invalid.is_empty()
        }
    };

    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Prints `height = block` for every stored block.
fn dump_chain(chain: &NodeChain) -> Result<ExitCode> {
    for entry in chain.iter()? {
        let (height, block) = entry.context("failed to read block")?;
        println!("{} = {}", height, serde_json::to_string(&block)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn reset_chain(chain: &NodeChain, confirmed: bool) -> Result<ExitCode> {
    if !confirmed {
        bail!("refusing to delete the chain without --yes");
    }
    let removed = chain.teardown().context("teardown failed")?;
    println!("Removed {removed} blocks");
    Ok(ExitCode::SUCCESS)
}

/// Serves the REST API and the metrics endpoint until a shutdown signal.
async fn serve(chain: Arc<NodeChain>, args: cli::ServeArgs) -> Result<ExitCode> {
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.chain_height.set(chain.current_height());

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            strand_protocol::config::PROTOCOL_VERSION,
        ),
        chain,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("strand-node stopped");
    Ok(ExitCode::SUCCESS)
}

/// Prints version information to stdout.
fn print_version() {
    println!("strand-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", strand_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
