//! # Block Structure
//!
//! A block is one sealed record in the chain: an opaque payload plus the
//! metadata that makes retroactive edits detectable.
//!
//! ## Block Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  hash: String              (hex digest, see below)│
//! │  height: u64               (genesis = 0)          │
//! │  body: serde_json::Value   (opaque payload)       │
//! │  time: u64                 (unix seconds)         │
//! │  previousBlockHash: String ("" for genesis)       │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The persisted JSON uses exactly these field names in exactly this order.
//!
//! ## Hash Computation
//!
//! The hash covers the canonical serialization of the block with `hash`
//! itself treated as empty. The encoding is explicit rather than "whatever
//! serde emits", so the digest does not depend on struct field order or on
//! serializer settings:
//!
//! ```text
//! "strand/block/v1"
//! u32 BE len || hash               (always len 0)
//! u64 BE height
//! u32 BE len || body               (compact JSON, object keys sorted)
//! u64 BE time
//! u32 BE len || previousBlockHash  (UTF-8 hex)
//! ```
//!
//! Object keys inside `body` come out sorted because `serde_json::Map` is a
//! `BTreeMap` unless the `preserve_order` feature is enabled. Nothing in this
//! workspace enables it; enabling it would change the encoding of object
//! bodies and must come with a new encoding tag.
//!
//! The workspace enables serde_json's `float_roundtrip` feature. Without it
//! some `f64` bodies parse back to a neighbouring float after a trip through
//! the store, and the recomputed preimage no longer matches the sealed one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{CANONICAL_ENCODING_TAG, EMPTY_HASH};
use crate::crypto::hash::HashAlgorithm;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A single chain record.
///
/// Freshly constructed blocks are *unsealed*: empty hash, height 0, time 0.
/// [`Block::seal`] fills in the chain metadata and the hash. Once a block has
/// been persisted it is never modified again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hex digest of the canonical serialization. Empty until sealed.
    pub hash: String,
    /// Zero-based position in the chain.
    pub height: u64,
    /// Caller-supplied payload. Not interpreted by the chain.
    pub body: Value,
    /// Seal time, seconds since the Unix epoch.
    pub time: u64,
    /// Hash of the block at `height - 1`. Empty for genesis.
    #[serde(rename = "previousBlockHash")]
    pub previous_block_hash: String,
}

impl Block {
    /// Construct an unsealed block holding `body`.
    pub fn new(body: impl Into<Value>) -> Self {
        Block {
            hash: EMPTY_HASH.to_string(),
            height: 0,
            body: body.into(),
            time: 0,
            previous_block_hash: EMPTY_HASH.to_string(),
        }
    }

    /// Seal the block at `height`, linking it to `previous_block_hash`.
    ///
    /// Any hash already present is discarded and recomputed.
    pub fn seal(
        mut self,
        height: u64,
        time: u64,
        previous_block_hash: impl Into<String>,
        algorithm: HashAlgorithm,
    ) -> Self {
        self.height = height;
        self.time = time;
        self.previous_block_hash = previous_block_hash.into();
        self.hash = self.compute_hash(algorithm);
        self
    }

    /// Canonical hash preimage, with `hash` treated as empty.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let body = self.body.to_string();
        let mut preimage = Vec::with_capacity(
            CANONICAL_ENCODING_TAG.len() + 32 + body.len() + self.previous_block_hash.len(),
        );
        preimage.extend_from_slice(CANONICAL_ENCODING_TAG);
        put_field(&mut preimage, EMPTY_HASH.as_bytes());
        preimage.extend_from_slice(&self.height.to_be_bytes());
        put_field(&mut preimage, body.as_bytes());
        preimage.extend_from_slice(&self.time.to_be_bytes());
        put_field(&mut preimage, self.previous_block_hash.as_bytes());
        preimage
    }

    /// Recompute the hash from the block's current fields.
    pub fn compute_hash(&self, algorithm: HashAlgorithm) -> String {
        algorithm.digest_hex(&self.canonical_bytes())
    }

    /// Whether the stored hash matches the block's content.
    pub fn verify_hash(&self, algorithm: HashAlgorithm) -> bool {
        self.hash == self.compute_hash(algorithm)
    }

    /// Whether this block's previous-hash field points at `parent`.
    pub fn links_to(&self, parent: &Block) -> bool {
        self.previous_block_hash == parent.hash
    }

    /// Whether the block carries a hash.
    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Append a u32 big-endian length prefix followed by `bytes`.
fn put_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
