//! # Cryptographic Primitives
//!
//! Strand only needs one primitive: a collision-resistant hash for sealing
//! blocks. Everything here is a thin wrapper around audited crates
//! (`blake3`, `sha2`); nothing is implemented by hand.

pub mod hash;

pub use hash::{blake3_hash, sha256, HashAlgorithm};
