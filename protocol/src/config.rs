//! # Protocol Configuration & Constants
//!
//! Every magic number in Strand lives here. The canonical encoding tag and
//! the metadata keys are part of the on-disk format: changing them after
//! data has been written means every stored hash stops verifying, so treat
//! them as frozen.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::HashAlgorithm;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Domain tag prefixed to every block hash preimage.
///
/// Bump the trailing version whenever the canonical field order or encoding
/// in [`crate::storage::block::Block::canonical_bytes`] changes.
pub const CANONICAL_ENCODING_TAG: &[u8] = b"strand/block/v1";

// ---------------------------------------------------------------------------
// Chain Constants
// ---------------------------------------------------------------------------

/// Body of the block appended by [`crate::storage::chain::ChainManager::ensure_genesis`].
pub const GENESIS_BODY: &str = "First block in the chain - Genesis block";

/// Previous-hash sentinel carried by the genesis block.
pub const EMPTY_HASH: &str = "";

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// sled tree holding sealed blocks keyed by big-endian height.
pub const BLOCKS_TREE: &str = "blocks";

/// sled tree holding chain metadata records.
pub const METADATA_TREE: &str = "metadata";

/// Metadata key for the height of the last sealed block.
pub const META_TIP_HEIGHT: &str = "tip_height";

/// Metadata key for the hash algorithm the chain was created with.
pub const META_HASH_ALGORITHM: &str = "hash_algorithm";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default on-disk location of the chain database.
pub const DEFAULT_DATA_DIR: &str = "./chaindata";

/// Default port for the HTTP API.
pub const DEFAULT_API_PORT: u16 = 9751;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9752;

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`crate::storage::chain::ChainManager`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Hash function used to seal blocks. Only consulted when the store is
    /// fresh; an existing store must match the algorithm it was created with.
    pub hash_algorithm: HashAlgorithm,
    /// Append the genesis block on open when the chain is empty.
    pub ensure_genesis: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Blake3,
            ensure_genesis: false,
        }
    }
}

impl ChainConfig {
    /// Config with the given hash algorithm and all other fields defaulted.
    pub fn with_algorithm(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            ..Self::default()
        }
    }
}
