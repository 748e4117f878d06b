//! In-memory block store for tests and ephemeral chains.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::block::Block;
use super::store::{height_key, BlockEntries, BlockStore, StoreResult};
use crate::config::META_TIP_HEIGHT;

#[derive(Debug, Default)]
struct Inner {
    blocks: BTreeMap<u64, Block>,
    metadata: HashMap<String, Vec<u8>>,
}

/// `BTreeMap`-backed [`BlockStore`].
///
/// Blocks and metadata share one lock, so a `put` is trivially atomic.
/// Nothing survives a drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored block without touching the tip marker.
    ///
    /// This bypasses every chain invariant and exists so integrity checks
    /// can be exercised against deliberately corrupted data.
    pub fn overwrite(&self, height: u64, block: Block) {
        self.inner.write().blocks.insert(height, block);
    }
}

impl BlockStore for MemoryStore {
    fn get(&self, height: u64) -> StoreResult<Option<Block>> {
        Ok(self.inner.read().blocks.get(&height).cloned())
    }

    fn put(&self, height: u64, block: &Block) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.blocks.insert(height, block.clone());
        inner
            .metadata
            .insert(META_TIP_HEIGHT.to_string(), height_key(height).to_vec());
        Ok(())
    }

    fn delete(&self, height: u64) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.blocks.remove(&height);
        match inner.blocks.keys().next_back().copied() {
            Some(last) => {
                inner
                    .metadata
                    .insert(META_TIP_HEIGHT.to_string(), height_key(last).to_vec());
            }
            None => {
                inner.metadata.remove(META_TIP_HEIGHT);
            }
        }
        Ok(())
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.inner.read().blocks.len() as u64)
    }

    fn iter(&self) -> StoreResult<BlockEntries<'_>> {
        // Snapshot so the lock is not held while the caller iterates.
        let entries: Vec<_> = self
            .inner
            .read()
            .blocks
            .iter()
            .map(|(height, block)| Ok((*height, block.clone())))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn last_height(&self) -> StoreResult<Option<u64>> {
        Ok(self.inner.read().blocks.keys().next_back().copied())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().metadata.get(key).cloned())
    }

    fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner
            .write()
            .metadata
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete_meta(&self, key: &str) -> StoreResult<()> {
        self.inner.write().metadata.remove(key);
        Ok(())
    }

    fn heights(&self) -> StoreResult<Vec<u64>> {
        Ok(self.inner.read().blocks.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    fn block(height: u64) -> Block {
        Block::new(format!("block {height}")).seal(height, 1_000 + height, "", HashAlgorithm::Blake3)
    }

    #[test]
    fn new_store_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.last_height().unwrap(), None);
        assert_eq!(store.tip().unwrap(), None);
        assert!(store.get(0).unwrap().is_none());
    }

    #[test]
    fn put_moves_tip_marker() {
        let store = MemoryStore::new();
        store.put(0, &block(0)).unwrap();
        store.put(1, &block(1)).unwrap();
        assert_eq!(store.tip().unwrap(), Some(1));
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get(1).unwrap(), Some(block(1)));
    }

    #[test]
    fn delete_keeps_tip_at_highest_remaining() {
        let store = MemoryStore::new();
        for h in 0..3 {
            store.put(h, &block(h)).unwrap();
        }

        store.delete(2).unwrap();
        assert_eq!(store.tip().unwrap(), Some(1));

        store.delete(0).unwrap();
        assert_eq!(store.tip().unwrap(), Some(1));

        store.delete(1).unwrap();
        assert_eq!(store.tip().unwrap(), None);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn iter_is_ascending() {
        let store = MemoryStore::new();
        for h in [2, 0, 1] {
            store.put(h, &block(h)).unwrap();
        }
        let heights: Vec<u64> = store.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(heights, vec![0, 1, 2]);
        assert_eq!(store.heights().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn overwrite_leaves_tip_alone() {
        let store = MemoryStore::new();
        store.put(0, &block(0)).unwrap();
        store.overwrite(5, block(5));
        assert_eq!(store.tip().unwrap(), Some(0));
        assert_eq!(store.last_height().unwrap(), Some(5));
    }

    #[test]
    fn metadata_crud() {
        let store = MemoryStore::new();
        assert!(store.get_meta("k").unwrap().is_none());
        store.put_meta("k", b"v").unwrap();
        assert_eq!(store.get_meta("k").unwrap(), Some(b"v".to_vec()));
        store.delete_meta("k").unwrap();
        assert!(store.get_meta("k").unwrap().is_none());
    }
}
