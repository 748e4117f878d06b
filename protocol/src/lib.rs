// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strand Protocol — Core Library
//!
//! Strand is a tamper-evident, append-only block chain kept in a local
//! key-value store. Each block carries an opaque payload, its height, a seal
//! time, and the hash of the block before it. Editing any stored block after
//! the fact breaks either its own hash or the link from its successor, and
//! validation reports exactly which heights are affected.
//!
//! There is no network, no consensus and no signing. One process owns one
//! chain.
//!
//! ## Architecture
//!
//! - **crypto** — Digest primitives and the selectable block hash algorithm.
//! - **storage** — Blocks, the `BlockStore` seam, sled and in-memory
//!   backends, and the `ChainManager`.
//! - **config** — Protocol constants, storage layout, and `ChainConfig`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use strand_protocol::config::ChainConfig;
//! use strand_protocol::storage::{ChainManager, SledStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SledStore::open("./chaindata")?);
//! let chain = ChainManager::open(store, &ChainConfig::default())?;
//!
//! chain.add_block("hello")?;
//! assert!(chain.validate_chain().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod storage;
