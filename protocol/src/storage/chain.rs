//! # Chain Management
//!
//! [`ChainManager`] owns one [`BlockStore`] and is the only component that
//! writes to it. It assigns heights, links each block to its predecessor,
//! and answers the question "has anything been edited since it was
//! written?".
//!
//! ## Concurrency
//!
//! All chain state sits behind a single `RwLock`:
//!
//! ```text
//! add_block / append / ensure_genesis / teardown   → write lock
//! get_block / validate_block / validate_chain / iter → read lock
//! ```
//!
//! The write lock is held across the whole read-tip / read-predecessor /
//! seal / put sequence, so two appends can never compute the same height.
//! Readers share the lock with each other but never observe a block whose
//! write has not finished.
//!
//! Read paths take the lock recursively: a thread holding a
//! [`ChainIterator`] can keep calling read methods even while a writer is
//! queued. The write lock is not reentrant, so calling a mutating method
//! while holding an iterator on the same thread deadlocks.
//!
//! ## Height Tracking
//!
//! The tip height lives in memory and is mirrored in the store's
//! `tip_height` metadata record, written atomically with each block. On
//! open the highest stored key is the source of truth: a disagreeing marker
//! is repaired, never trusted.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::block::Block;
use super::iter::ChainIterator;
use super::store::{BlockStore, StoreError};
use crate::config::{ChainConfig, EMPTY_HASH, GENESIS_BODY, META_HASH_ALGORITHM};
use crate::crypto::hash::HashAlgorithm;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors surfaced by [`ChainManager`] operations.
///
/// Integrity failures are not errors. They are reported as data by
/// [`ChainManager::validate_block`] and [`ChainManager::validate_chain`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No block is stored at the requested height.
    #[error("block not found at height {0}")]
    NotFound(u64),

    /// The underlying store failed to read, write or delete.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store was created with a different hash algorithm.
    #[error("chain was sealed with {stored}, but {configured} is configured")]
    AlgorithmMismatch {
        /// Algorithm recorded in the store's metadata.
        stored: String,
        /// Algorithm requested by the caller's config.
        configured: HashAlgorithm,
    },
}

pub type ChainResult<T> = Result<T, ChainError>;

// ---------------------------------------------------------------------------
// Validation Results
// ---------------------------------------------------------------------------

/// Outcome of checking a single block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockValidation {
    pub valid: bool,
    pub height: u64,
}

// ---------------------------------------------------------------------------
// ChainManager
// ---------------------------------------------------------------------------

/// Mutable chain state guarded by the manager's lock.
#[derive(Debug, Default)]
pub(crate) struct ChainState {
    /// Height of the last sealed block; `None` while the chain is empty.
    pub(crate) tip: Option<u64>,
}

/// Append-only, hash-linked chain over a [`BlockStore`].
pub struct ChainManager<S: BlockStore> {
    pub(crate) store: Arc<S>,
    algorithm: HashAlgorithm,
    pub(crate) state: RwLock<ChainState>,
}

impl<S: BlockStore> ChainManager<S> {
    /// Open a chain over `store`.
    ///
    /// Records the configured hash algorithm on a fresh store, or checks it
    /// against the recorded one. Recovers the tip from the stored keys and
    /// repairs the tip marker if it disagrees. Appends the genesis block when
    /// `config.ensure_genesis` is set and the chain is empty.
    pub fn open(store: Arc<S>, config: &ChainConfig) -> ChainResult<Self> {
        let algorithm = resolve_algorithm(store.as_ref(), config.hash_algorithm)?;
        let tip = recover_tip(store.as_ref())?;

        info!(tip = ?tip, algorithm = %algorithm, "chain opened");

        let chain = Self {
            store,
            algorithm,
            state: RwLock::new(ChainState { tip }),
        };

        if config.ensure_genesis {
            chain.ensure_genesis()?;
        }

        Ok(chain)
    }

    /// Hash algorithm used to seal and verify blocks.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Height of the last sealed block, or `None` for an empty chain.
    pub fn tip(&self) -> Option<u64> {
        self.state.read_recursive().tip
    }

    /// Height of the last sealed block, or `-1` for an empty chain.
    pub fn current_height(&self) -> i64 {
        self.tip().map_or(-1, |tip| tip as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.tip().is_none()
    }

    // -- Writes -------------------------------------------------------------

    /// Seal `body` into a new block at the next height and persist it.
    ///
    /// Returns the new block's hash. On a store failure the height is not
    /// consumed and the call can be retried.
    pub fn add_block(&self, body: impl Into<Value>) -> ChainResult<String> {
        self.append(Block::new(body)).map(|block| block.hash)
    }

    /// Seal `block` at the next height, persist it, and return the sealed
    /// block.
    ///
    /// Whatever height, time and hashes the block carries are overwritten.
    pub fn append(&self, block: Block) -> ChainResult<Block> {
        let mut state = self.state.write();
        self.append_locked(&mut state, block)
    }

    /// Append the genesis block if the chain is empty.
    ///
    /// Returns the genesis hash when a block was written, `None` when the
    /// chain already had one.
    pub fn ensure_genesis(&self) -> ChainResult<Option<String>> {
        let mut state = self.state.write();
        if state.tip.is_some() {
            return Ok(None);
        }
        let genesis = self.append_locked(&mut state, Block::new(GENESIS_BODY))?;
        info!(hash = %genesis.hash, "genesis block created");
        Ok(Some(genesis.hash))
    }

    fn append_locked(&self, state: &mut ChainState, block: Block) -> ChainResult<Block> {
        let height = state.tip.map_or(0, |tip| tip + 1);

        let previous_hash = match state.tip {
            Some(tip) => self.store.get(tip)?.ok_or(ChainError::NotFound(tip))?.hash,
            None => EMPTY_HASH.to_string(),
        };

        let block = block.seal(height, now_secs(), previous_hash, self.algorithm);

        if let Err(e) = self.store.put(height, &block) {
            // Never advance on failure; re-read what actually landed.
            if let Ok(persisted) = self.store.last_height() {
                state.tip = persisted;
            }
            warn!(height, error = %e, "block write failed");
            return Err(e.into());
        }

        state.tip = Some(height);
        info!(height, hash = %block.hash, "block appended");
        Ok(block)
    }

    // -- Reads --------------------------------------------------------------

    /// Fetch the block at `height`.
    pub fn get_block(&self, height: u64) -> ChainResult<Block> {
        let _state = self.state.read_recursive();
        self.store.get(height)?.ok_or(ChainError::NotFound(height))
    }

    /// Iterate over every stored block in ascending height order.
    ///
    /// The iterator holds the read lock until dropped, so no write can
    /// interleave with the traversal.
    pub fn iter(&self) -> ChainResult<ChainIterator<'_>> {
        let guard = self.state.read_recursive();
        let entries = self.store.iter()?;
        Ok(ChainIterator::new(guard, entries))
    }

    // -- Validation ---------------------------------------------------------

    /// Check that the block at `height` still hashes to its stored hash.
    ///
    /// A block that is missing or cannot be read is reported as invalid.
    pub fn validate_block(&self, height: u64) -> BlockValidation {
        let _state = self.state.read_recursive();
        let valid = match self.load_for_validation(height) {
            Some(block) => self.is_intact(height, &block),
            None => false,
        };
        BlockValidation { valid, height }
    }

    /// Validate every block and every link, returning the failing heights.
    ///
    /// A height fails when its own hash check fails, or when it is not the
    /// last block and the next block's `previous_block_hash` does not match
    /// its stored hash. Link breaks are attributed to the earlier height.
    /// The whole pass runs against one consistent snapshot and always
    /// completes.
    pub fn validate_chain(&self) -> BTreeSet<u64> {
        let state = self.state.read_recursive();
        let mut invalid = BTreeSet::new();

        let Some(tip) = state.tip else {
            info!("chain is empty, nothing to validate");
            return invalid;
        };

        let mut previous: Option<Block> = None;
        for height in 0..=tip {
            let current = self.load_for_validation(height);

            let intact = current
                .as_ref()
                .is_some_and(|block| self.is_intact(height, block));
            if !intact {
                invalid.insert(height);
            }

            if height > 0 {
                let linked = matches!(
                    (&previous, &current),
                    (Some(parent), Some(child)) if child.links_to(parent)
                );
                if !linked {
                    warn!(height = height - 1, next = height, "broken hash link");
                    invalid.insert(height - 1);
                }
            }

            previous = current;
        }

        if invalid.is_empty() {
            info!(blocks = tip + 1, "no errors detected");
        } else {
            warn!(
                errors = invalid.len(),
                heights = ?invalid,
                "chain validation failed"
            );
        }

        invalid
    }

    /// Read a block for validation, downgrading every failure to `None`.
    fn load_for_validation(&self, height: u64) -> Option<Block> {
        match self.store.get(height) {
            Ok(Some(block)) => Some(block),
            Ok(None) => {
                warn!(height, "block missing");
                None
            }
            Err(e) => {
                warn!(height, error = %e, "block unreadable");
                None
            }
        }
    }

    /// Self-consistency of one block stored under `height`.
    fn is_intact(&self, height: u64, block: &Block) -> bool {
        let computed = block.compute_hash(self.algorithm);
        if computed != block.hash {
            warn!(
                height,
                stored = %block.hash,
                computed = %computed,
                "block hash mismatch"
            );
            return false;
        }
        if block.height != height {
            warn!(height, recorded = block.height, "block stored under the wrong height");
            return false;
        }
        if block.is_genesis() && block.previous_block_hash != EMPTY_HASH {
            warn!("genesis block carries a previous hash");
            return false;
        }
        debug!(height, hash = %block.hash, "block valid");
        true
    }
}

// ---------------------------------------------------------------------------
// Recovery Helpers
// ---------------------------------------------------------------------------

/// Hash algorithm recorded in `store`, or `None` for a store no chain has
/// been opened on yet.
///
/// Lets a caller open an existing chain without knowing up front which
/// algorithm sealed it.
pub fn stored_algorithm<S: BlockStore + ?Sized>(store: &S) -> ChainResult<Option<HashAlgorithm>> {
    match store.get_meta(META_HASH_ALGORITHM)? {
        Some(bytes) => {
            let stored = String::from_utf8_lossy(&bytes);
            stored.parse::<HashAlgorithm>().map(Some).map_err(|e| {
                ChainError::Store(StoreError::Serialization(format!("{META_HASH_ALGORITHM}: {e}")))
            })
        }
        None => Ok(None),
    }
}

/// Check the configured algorithm against the store, recording it if absent.
fn resolve_algorithm<S: BlockStore + ?Sized>(
    store: &S,
    configured: HashAlgorithm,
) -> ChainResult<HashAlgorithm> {
    match store.get_meta(META_HASH_ALGORITHM)? {
        Some(bytes) => {
            let stored = String::from_utf8_lossy(&bytes).into_owned();
            match stored.parse::<HashAlgorithm>() {
                Ok(algorithm) if algorithm == configured => Ok(algorithm),
                _ => Err(ChainError::AlgorithmMismatch { stored, configured }),
            }
        }
        None => {
            store.put_meta(META_HASH_ALGORITHM, configured.as_str().as_bytes())?;
            Ok(configured)
        }
    }
}

/// Derive the tip from the stored keys and repair the marker if needed.
fn recover_tip<S: BlockStore + ?Sized>(store: &S) -> ChainResult<Option<u64>> {
    let marker = store.tip()?;
    let last = store.last_height()?;

    if marker != last {
        warn!(marker = ?marker, last = ?last, "tip marker out of sync, repairing");
        store.set_tip(last)?;
    }

    if let Some(last) = last {
        let count = store.count()?;
        if count != last + 1 {
            warn!(count, last, "stored heights are not contiguous");
        }
    }

    Ok(last)
}

/// Current time in whole seconds since the Unix epoch.
fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
