//! Fault-injecting store used by the chain tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::block::Block;
use super::memory::MemoryStore;
use super::store::{BlockEntries, BlockStore, StoreError, StoreResult};

/// [`MemoryStore`] wrapper whose writes can be made to fail on demand.
#[derive(Debug)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
    deletes_left: AtomicU64,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_puts: AtomicBool::new(false),
            deletes_left: AtomicU64::new(u64::MAX),
        }
    }

    pub(crate) fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Allow `n` more deletes to succeed, then fail every one after.
    pub(crate) fn fail_deletes_after(&self, n: u64) {
        self.deletes_left.store(n, Ordering::SeqCst);
    }
}

impl BlockStore for FlakyStore {
    fn get(&self, height: u64) -> StoreResult<Option<Block>> {
        self.inner.get(height)
    }

    fn put(&self, height: u64, block: &Block) -> StoreResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Transaction(format!("injected write failure at {height}")));
        }
        self.inner.put(height, block)
    }

    fn delete(&self, height: u64) -> StoreResult<()> {
        let allowed = self
            .deletes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Transaction(format!("injected delete failure at {height}")));
        }
        self.inner.delete(height)
    }

    fn count(&self) -> StoreResult<u64> {
        self.inner.count()
    }

    fn iter(&self) -> StoreResult<BlockEntries<'_>> {
        self.inner.iter()
    }

    fn last_height(&self) -> StoreResult<Option<u64>> {
        self.inner.last_height()
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get_meta(key)
    }

    fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.put_meta(key, value)
    }

    fn delete_meta(&self, key: &str) -> StoreResult<()> {
        self.inner.delete_meta(key)
    }
}
