//! Ordered traversal and teardown of a chain.

use parking_lot::RwLockReadGuard;
use tracing::{info, warn};

use super::block::Block;
use super::chain::{ChainError, ChainManager, ChainResult, ChainState};
use super::store::{BlockEntries, BlockStore};

/// Ascending-height iterator over a chain's blocks.
///
/// Holds the chain's read lock for its whole lifetime: writers wait until
/// it is dropped. A store read error is yielded as an item; iteration may
/// continue past it.
pub struct ChainIterator<'a> {
    entries: BlockEntries<'a>,
    _guard: RwLockReadGuard<'a, ChainState>,
}

impl<'a> ChainIterator<'a> {
    pub(crate) fn new(guard: RwLockReadGuard<'a, ChainState>, entries: BlockEntries<'a>) -> Self {
        Self {
            entries,
            _guard: guard,
        }
    }
}

impl Iterator for ChainIterator<'_> {
    type Item = ChainResult<(u64, Block)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|entry| entry.map_err(ChainError::from))
    }
}

impl<S: BlockStore> ChainManager<S> {
    /// Delete every block and reset the chain to empty.
    ///
    /// The set of heights is snapshotted before the first delete, so the
    /// traversal is never affected by its own removals. Returns the number
    /// of blocks removed. If a delete fails, the blocks already removed stay
    /// removed and the tip is re-derived from what remains.
    pub fn teardown(&self) -> ChainResult<u64> {
        let mut state = self.state.write();
        let heights = self.store.heights()?;

        let mut removed = 0u64;
        for height in heights {
            if let Err(e) = self.store.delete(height) {
                if let Ok(remaining) = self.store.last_height() {
                    state.tip = remaining;
                }
                warn!(height, removed, error = %e, "teardown interrupted");
                return Err(e.into());
            }
            removed += 1;
        }

        state.tip = None;
        self.store.set_tip(None)?;
        self.store.flush()?;

        info!(removed, "chain torn down");
        Ok(removed)
    }
}
