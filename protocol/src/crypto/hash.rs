//! # Hashing Utilities
//!
//! Hash functions used to seal blocks. Two are supported and there is no
//! plan to add more:
//!
//! - **BLAKE3** — the default. Fast everywhere, 256-bit output.
//! - **SHA-256** — for chains that need to be checked by tooling that only
//!   speaks SHA-256.
//!
//! A chain is sealed with exactly one algorithm for its whole life. The
//! choice is recorded in the store's metadata when the first block is
//! written (see [`crate::storage::chain::ChainManager::open`]).
//!
//! Digests are exchanged as lowercase hex strings, which is also how they
//! are persisted inside each block.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use strand_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"strand");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Selects the hash function used to seal blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3, 32-byte digest.
    #[default]
    Blake3,
    /// SHA-256, 32-byte digest.
    Sha256,
}

impl HashAlgorithm {
    /// Stable lowercase name, used for metadata records and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Raw 32-byte digest of `data`.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        match self {
            HashAlgorithm::Blake3 => blake3_hash(data),
            HashAlgorithm::Sha256 => sha256(data),
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}
