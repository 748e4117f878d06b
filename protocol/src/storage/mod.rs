//! # Storage Module
//!
//! The block chain itself: block structure, the persistence seam, and the
//! manager that ties them together.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  — Block structure, canonical encoding, hash/verify operations
//! store.rs  — BlockStore trait, key/value encoding, StoreError
//! memory.rs — BTreeMap-backed store for tests and throwaway chains
//! db.rs     — sled persistence with blocks/metadata trees
//! chain.rs  — ChainManager: append, lookup, validation
//! iter.rs   — ordered traversal and teardown
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! body → ChainManager::add_block → Block::seal → BlockStore::put
//!                                                  ↓
//!                                     MemoryStore | SledStore
//! ```
//!
//! Only the `ChainManager` writes. Everything it reads back is re-hashed on
//! validation, so an edit made underneath it (directly in the database, or
//! through `overwrite`) shows up as an invalid height rather than going
//! unnoticed.

pub mod block;
pub mod chain;
pub mod db;
pub mod iter;
pub mod memory;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use block::Block;
pub use chain::{stored_algorithm, BlockValidation, ChainError, ChainManager, ChainResult};
pub use db::SledStore;
pub use iter::ChainIterator;
pub use memory::MemoryStore;
pub use store::{BlockStore, StoreError, StoreResult};
