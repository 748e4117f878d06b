//! # CLI Interface
//!
//! Defines the command-line argument structure for `strand-node` using
//! `clap` derive. Every subcommand operates on the chain stored in
//! `--data-dir`; only `serve` keeps running.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use strand_protocol::config::{DEFAULT_API_PORT, DEFAULT_DATA_DIR, DEFAULT_METRICS_PORT};
use strand_protocol::crypto::HashAlgorithm;

use crate::logging::LogFormat;

/// Strand chain node.
///
/// Owns one tamper-evident block chain on disk. Appends blocks, looks them
/// up, validates the chain, and optionally serves all of that over HTTP with
/// Prometheus metrics alongside.
#[derive(Parser, Debug)]
#[command(
    name = "strand-node",
    about = "Strand tamper-evident block chain node",
    version,
    propagate_version = true
)]
pub struct StrandNodeCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding the chain database. Created if missing.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "STRAND_DATA_DIR",
        default_value = DEFAULT_DATA_DIR
    )]
    pub data_dir: PathBuf,

    /// Hash algorithm. Defaults to the one recorded in an existing chain,
    /// or blake3 for a new one. When given, it must match the recorded one.
    #[arg(long = "hash", global = true, env = "STRAND_HASH")]
    pub hash_algorithm: Option<HashAlgorithm>,

    /// Do not create the genesis block when `add` or `serve` finds the
    /// chain empty.
    #[arg(long, global = true, env = "STRAND_NO_GENESIS")]
    pub no_genesis: bool,

    /// Log output format.
    #[arg(long, global = true, env = "STRAND_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter. `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, default_value = "strand_node=info,strand_protocol=info")]
    pub log_level: String,
}

/// Top-level subcommands for the Strand node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a block and print its height and hash.
    Add(AddArgs),
    /// Print the block stored at a height as JSON.
    Get(GetArgs),
    /// Print the current chain height (-1 when empty).
    Height,
    /// Validate one block, or the whole chain when no height is given.
    ///
    /// Exits with status 1 if anything fails validation.
    Validate(ValidateArgs),
    /// Print every block in height order.
    Dump,
    /// Delete every block. Requires `--yes`.
    Reset(ResetArgs),
    /// Serve the HTTP API and the metrics endpoint.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

impl Commands {
    /// Whether the command appends genesis to an empty chain. Read-only
    /// commands and `reset` never write it.
    pub fn creates_genesis(&self) -> bool {
        matches!(self, Commands::Add(_) | Commands::Serve(_))
    }
}

/// Arguments for the `add` subcommand.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Block payload. Stored as a JSON string unless `--json` is given.
    pub body: String,

    /// Parse the payload as JSON instead of storing it as a string.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `get` subcommand.
#[derive(Args, Debug)]
pub struct GetArgs {
    pub height: u64,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Height of a single block to validate.
    pub height: Option<u64>,
}

/// Arguments for the `reset` subcommand.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm that every block should be deleted.
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the REST API.
    #[arg(long, env = "STRAND_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "STRAND_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Address to bind both listeners to.
    #[arg(long, env = "STRAND_BIND", default_value = "127.0.0.1")]
    pub bind: String,
}
