//! # BlockStore — the persistence seam
//!
//! The chain logic never talks to a database directly. It goes through
//! [`BlockStore`], an ordered map from height to sealed [`Block`] plus a
//! handful of named metadata records. Two backends ship with the crate:
//!
//! - [`MemoryStore`](super::memory::MemoryStore) — `BTreeMap` behind a lock,
//!   for tests and throwaway chains.
//! - [`SledStore`](super::db::SledStore) — durable sled trees.
//!
//! ## Contract
//!
//! - `get` returns a whole block or `None`. A value that cannot be decoded is
//!   a [`StoreError::Serialization`], never a half-filled block.
//! - `put` writes the block *and* moves the tip marker to its height in one
//!   atomic step, then flushes. Success means durable.
//! - `delete` removes one block and keeps the tip marker pointing at the
//!   highest remaining height.
//! - `iter` yields `(height, block)` in ascending height order. It is lazy,
//!   finite and single-pass.

use crate::config::META_TIP_HEIGHT;

use super::block::Block;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by a [`BlockStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Iterator returned by [`BlockStore::iter`].
pub type BlockEntries<'a> = Box<dyn Iterator<Item = StoreResult<(u64, Block)>> + 'a>;

// ---------------------------------------------------------------------------
// Key / Value Encoding
// ---------------------------------------------------------------------------

/// Encode a height as a big-endian key so byte order equals numeric order.
pub fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Decode a big-endian height key.
pub fn decode_height(bytes: &[u8]) -> StoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::CorruptKey(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Serialize a block to its persisted JSON form.
pub fn encode_block(block: &Block) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(block).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Parse a block from its persisted JSON form.
pub fn decode_block(bytes: &[u8]) -> StoreResult<Block> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// BlockStore
// ---------------------------------------------------------------------------

/// Ordered, durable map from chain height to sealed block.
pub trait BlockStore: Send + Sync {
    /// Fetch the block stored at `height`.
    fn get(&self, height: u64) -> StoreResult<Option<Block>>;

    /// Store `block` at `height` and move the tip marker there, atomically.
    fn put(&self, height: u64, block: &Block) -> StoreResult<()>;

    /// Remove the block at `height`. Removing a missing height is a no-op.
    fn delete(&self, height: u64) -> StoreResult<()>;

    /// Number of stored blocks.
    fn count(&self) -> StoreResult<u64>;

    /// All stored blocks in ascending height order.
    fn iter(&self) -> StoreResult<BlockEntries<'_>>;

    /// Highest stored height, derived from the keys rather than the marker.
    fn last_height(&self) -> StoreResult<Option<u64>>;

    /// Read a named metadata record.
    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a named metadata record.
    fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove a named metadata record.
    fn delete_meta(&self, key: &str) -> StoreResult<()>;

    /// Force buffered writes to durable storage.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Height recorded by the tip marker.
    fn tip(&self) -> StoreResult<Option<u64>> {
        match self.get_meta(META_TIP_HEIGHT)? {
            Some(bytes) => Ok(Some(decode_height(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the tip marker. `None` clears it.
    fn set_tip(&self, tip: Option<u64>) -> StoreResult<()> {
        match tip {
            Some(height) => self.put_meta(META_TIP_HEIGHT, &height_key(height)),
            None => self.delete_meta(META_TIP_HEIGHT),
        }
    }

    /// Heights currently stored, ascending. Taken as a snapshot.
    fn heights(&self) -> StoreResult<Vec<u64>> {
        self.iter()?
            .map(|entry| entry.map(|(height, _)| height))
            .collect()
    }
}
