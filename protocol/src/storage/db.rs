//! # SledStore — Persistent Block Storage
//!
//! The durable [`BlockStore`] backend, built on sled's embedded key-value
//! store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                | Value                                 |
//! |------------|--------------------|---------------------------------------|
//! | `blocks`   | `height` (8B BE)   | JSON block                            |
//! | `metadata` | key (UTF-8)        | value (bytes)                         |
//!
//! Heights are stored big-endian so sled's lexicographic ordering matches
//! numeric ordering and range scans come out in chain order.
//!
//! ## Atomicity
//!
//! `put` writes the block and the `tip_height` metadata record in a single
//! multi-tree transaction, then flushes. Either both land on disk or
//! neither does.
//!
//! `delete` is not transactional: sled transactions cannot scan, and the new
//! tip is the highest *remaining* key. The block is removed first and the
//! marker rewritten second. A crash in between leaves a marker that points
//! past the last block, which
//! [`ChainManager::open`](super::chain::ChainManager::open) detects and
//! repairs.

use std::path::Path;

use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};

use super::block::Block;
use super::store::{
    decode_block, decode_height, encode_block, height_key, BlockEntries, BlockStore, StoreError,
    StoreResult,
};
use crate::config::{BLOCKS_TREE, METADATA_TREE, META_TIP_HEIGHT};

/// Durable block store backed by sled.
///
/// sled is internally synchronized, so `SledStore` is `Send + Sync` and
/// can be shared behind an `Arc` without extra locking. Write ordering for
/// the chain is enforced one level up, in the `ChainManager`.
#[derive(Debug, Clone)]
pub struct SledStore {
    /// The underlying sled database handle.
    db: Db,
    /// Blocks indexed by height (big-endian u64 keys).
    blocks: Tree,
    /// Chain metadata: tip marker, hash algorithm.
    metadata: Tree,
}

impl SledStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary store that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let metadata = db.open_tree(METADATA_TREE)?;
        Ok(Self {
            db,
            blocks,
            metadata,
        })
    }

    /// Overwrite the raw bytes stored at `height`, leaving the tip marker
    /// untouched. Bypasses every chain invariant; used to simulate tampering.
    pub fn overwrite(&self, height: u64, block: &Block) -> StoreResult<()> {
        self.blocks.insert(height_key(height), encode_block(block)?)?;
        self.db.flush()?;
        Ok(())
    }
}

impl BlockStore for SledStore {
    fn get(&self, height: u64) -> StoreResult<Option<Block>> {
        match self.blocks.get(height_key(height))? {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, height: u64, block: &Block) -> StoreResult<()> {
        let key = height_key(height);
        let value = encode_block(block)?;

        (&self.blocks, &self.metadata)
            .transaction(|(blocks, metadata)| -> ConflictableTransactionResult<(), ()> {
                blocks.insert(key.as_slice(), value.as_slice())?;
                metadata.insert(META_TIP_HEIGHT.as_bytes(), key.as_slice())?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => StoreError::Sled(e),
                TransactionError::Abort(()) => {
                    StoreError::Transaction(format!("write of block {height} aborted"))
                }
            })?;

        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, height: u64) -> StoreResult<()> {
        self.blocks.remove(height_key(height))?;

        match self.blocks.last()? {
            Some((key, _)) => {
                self.metadata.insert(META_TIP_HEIGHT, key)?;
            }
            None => {
                self.metadata.remove(META_TIP_HEIGHT)?;
            }
        }

        self.db.flush()?;
        Ok(())
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.blocks.len() as u64)
    }

    fn iter(&self) -> StoreResult<BlockEntries<'_>> {
        let entries = self.blocks.iter().map(|entry| -> StoreResult<(u64, Block)> {
            let (key, value) = entry?;
            Ok((decode_height(&key)?, decode_block(&value)?))
        });
        Ok(Box::new(entries))
    }

    fn last_height(&self) -> StoreResult<Option<u64>> {
        match self.blocks.last()? {
            Some((key, _)) => Ok(Some(decode_height(&key)?)),
            None => Ok(None),
        }
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.metadata.get(key)?.map(|v| v.to_vec()))
    }

    fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.metadata.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete_meta(&self, key: &str) -> StoreResult<()> {
        self.metadata.remove(key)?;
        self.db.flush()?;
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn heights(&self) -> StoreResult<Vec<u64>> {
        self.blocks
            .iter()
            .keys()
            .map(|key| decode_height(&key?))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    fn make_block(height: u64) -> Block {
        Block::new(format!("payload {height}")).seal(height, 1_000 + height, "", HashAlgorithm::Blake3)
    }

    #[test]
    fn open_temporary_store() {
        let store = SledStore::open_temporary().expect("should create temp store");
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.tip().unwrap(), None);
        assert_eq!(store.last_height().unwrap(), None);
    }

    #[test]
    fn store_and_retrieve_block() {
        let store = SledStore::open_temporary().unwrap();
        let block = make_block(0);
        store.put(0, &block).unwrap();

        let retrieved = store.get(0).unwrap().expect("block 0 should exist");
        assert_eq!(retrieved, block);
        assert_eq!(store.tip().unwrap(), Some(0));
    }

    #[test]
    fn get_returns_none_for_missing_height() {
        let store = SledStore::open_temporary().unwrap();
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn persisted_value_is_plain_json() {
        let store = SledStore::open_temporary().unwrap();
        store.put(0, &make_block(0)).unwrap();

        let raw = store.blocks.get(height_key(0)).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["height"], 0);
        assert_eq!(value["previousBlockHash"], "");
        assert_eq!(value["body"], "payload 0");
    }

    #[test]
    fn float_body_still_verifies_after_decode() {
        let store = SledStore::open_temporary().unwrap();
        let block = Block::new(serde_json::json!({"amount": 1.0715660391465826e-75, "n": u64::MAX}))
            .seal(0, 1_000, "", HashAlgorithm::Blake3);
        store.put(0, &block).unwrap();

        let stored = store.get(0).unwrap().unwrap();
        assert_eq!(stored, block);
        assert!(stored.verify_hash(HashAlgorithm::Blake3));
    }

    #[test]
    fn undecodable_value_is_an_error() {
        let store = SledStore::open_temporary().unwrap();
        store.blocks.insert(height_key(3), &b"garbage"[..]).unwrap();
        assert!(matches!(store.get(3), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn iteration_is_numeric_order() {
        let store = SledStore::open_temporary().unwrap();
        for h in [300u64, 2, 256, 0, 1] {
            store.put(h, &make_block(h)).unwrap();
        }

        let heights: Vec<u64> = store.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(heights, vec![0, 1, 2, 256, 300]);
        assert_eq!(store.heights().unwrap(), heights);
        assert_eq!(store.last_height().unwrap(), Some(300));
    }

    #[test]
    fn delete_rewrites_tip_marker() {
        let store = SledStore::open_temporary().unwrap();
        for h in 0..3 {
            store.put(h, &make_block(h)).unwrap();
        }

        store.delete(2).unwrap();
        assert_eq!(store.tip().unwrap(), Some(1));
        assert_eq!(store.count().unwrap(), 2);

        store.delete(0).unwrap();
        store.delete(1).unwrap();
        assert_eq!(store.tip().unwrap(), None);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn reopen_preserves_blocks_and_tip() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = SledStore::open(dir.path()).expect("should open store");
            store.put(0, &make_block(0)).unwrap();
            store.put(1, &make_block(1)).unwrap();
        }

        let store = SledStore::open(dir.path()).expect("should reopen store");
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.tip().unwrap(), Some(1));
        assert_eq!(store.get(1).unwrap(), Some(make_block(1)));
    }

    #[test]
    fn overwrite_does_not_move_tip() {
        let store = SledStore::open_temporary().unwrap();
        store.put(0, &make_block(0)).unwrap();
        store.put(1, &make_block(1)).unwrap();

        let mut tampered = make_block(0);
        tampered.body = serde_json::json!("edited");
        store.overwrite(0, &tampered).unwrap();

        assert_eq!(store.get(0).unwrap(), Some(tampered));
        assert_eq!(store.tip().unwrap(), Some(1));
    }

    #[test]
    fn metadata_roundtrip() {
        let store = SledStore::open_temporary().unwrap();
        store.put_meta("hash_algorithm", b"sha256").unwrap();
        assert_eq!(store.get_meta("hash_algorithm").unwrap(), Some(b"sha256".to_vec()));
        store.delete_meta("hash_algorithm").unwrap();
        assert!(store.get_meta("hash_algorithm").unwrap().is_none());
    }

    #[test]
    fn concurrent_reads_do_not_block() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SledStore::open_temporary().unwrap());
        for h in 0..10 {
            store.put(h, &make_block(h)).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for h in 0..10 {
                        let block = store.get(h).unwrap().unwrap();
                        assert_eq!(block.height, h);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("reader thread should not panic");
        }
    }
}
