//! End-to-end integration tests for the Strand chain.
//!
//! These tests drive a `ChainManager` over a real sled database on disk:
//! appending, closing and reopening, tampering with stored bytes, and tearing
//! the chain down. They prove that the pieces compose the way a process that
//! owns a chain directory would use them.
//!
//! Each test gets its own temporary directory. No shared state.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use serde_json::json;

use strand_protocol::config::{ChainConfig, GENESIS_BODY};
use strand_protocol::crypto::HashAlgorithm;
use strand_protocol::storage::{BlockStore, ChainError, ChainManager, SledStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn open_at(path: &Path, config: &ChainConfig) -> ChainManager<SledStore> {
    let store = Arc::new(SledStore::open(path).expect("open sled store"));
    ChainManager::open(store, config).expect("open chain")
}

fn open_default(path: &Path) -> ChainManager<SledStore> {
    open_at(path, &ChainConfig::default())
}

// ---------------------------------------------------------------------------
// Scenario: build a chain and validate it
// ---------------------------------------------------------------------------

#[test]
fn genesis_plus_ten_blocks_validate() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChainConfig {
        ensure_genesis: true,
        ..ChainConfig::default()
    };
    let chain = open_at(dir.path(), &config);

    for i in 0..10 {
        chain.add_block(format!("test data {i}")).unwrap();
    }

    assert_eq!(chain.current_height(), 10);
    assert_eq!(chain.get_block(0).unwrap().body, json!(GENESIS_BODY));
    for h in 0..=10 {
        assert!(chain.validate_block(h).valid, "height {h}");
    }
    assert!(chain.validate_chain().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario: restart
// ---------------------------------------------------------------------------

#[test]
fn chain_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let hashes: Vec<String> = {
        let chain = open_default(dir.path());
        (0..5).map(|i| chain.add_block(i).unwrap()).collect()
    };

    let chain = open_default(dir.path());
    assert_eq!(chain.current_height(), 4);
    for (h, hash) in hashes.iter().enumerate() {
        assert_eq!(&chain.get_block(h as u64).unwrap().hash, hash);
    }

    let next = chain.add_block("after restart").unwrap();
    let block = chain.get_block(5).unwrap();
    assert_eq!(block.hash, next);
    assert_eq!(block.previous_block_hash, hashes[4]);
    assert!(chain.validate_chain().is_empty());
}

#[test]
fn reopening_does_not_duplicate_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChainConfig {
        ensure_genesis: true,
        ..ChainConfig::default()
    };

    let genesis_hash = open_at(dir.path(), &config).get_block(0).unwrap().hash;
    let chain = open_at(dir.path(), &config);

    assert_eq!(chain.current_height(), 0);
    assert_eq!(chain.get_block(0).unwrap().hash, genesis_hash);
}

#[test]
fn algorithm_is_pinned_at_creation() {
    let dir = tempfile::tempdir().unwrap();
    let sha = ChainConfig::with_algorithm(HashAlgorithm::Sha256);
    {
        let chain = open_at(dir.path(), &sha);
        chain.add_block("sealed with sha256").unwrap();
    }

    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let err = ChainManager::open(store, &ChainConfig::default()).err();
    assert!(matches!(err, Some(ChainError::AlgorithmMismatch { .. })));

    let chain = open_at(dir.path(), &sha);
    assert!(chain.validate_chain().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario: structured bodies survive the trip through sled
// ---------------------------------------------------------------------------

#[test]
fn structured_bodies_validate_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let bodies = [
        json!({"amount": 1.0715660391465826e-75}),
        json!({"ratio": 0.1, "pi": std::f64::consts::PI, "tiny": 5e-324, "huge": 1.7976931348623157e308}),
        json!({"max": u64::MAX, "min": i64::MIN, "zero": 0}),
        json!({"outer": {"z": [1, 2.5, {"deep": -0.0}], "a": null}, "flag": true}),
        json!([0.30000000000000004, "text", {"b": 1, "a": 2}]),
    ];
    {
        let chain = open_default(dir.path());
        for body in &bodies {
            chain.add_block(body.clone()).unwrap();
        }
        assert!(chain.validate_chain().is_empty());
    }

    let chain = open_default(dir.path());
    assert!(chain.validate_chain().is_empty());
    for (h, body) in bodies.iter().enumerate() {
        let block = chain.get_block(h as u64).unwrap();
        assert_eq!(&block.body, body);
        assert!(chain.validate_block(h as u64).valid, "height {h}");
    }
}

// ---------------------------------------------------------------------------
// Scenario: tampering through the store
// ---------------------------------------------------------------------------

#[test]
fn tampering_on_disk_is_detected_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let chain = open_default(dir.path());
        for i in 0..10 {
            chain.add_block(format!("test data {i}")).unwrap();
        }

        for h in [2u64, 4, 7] {
            let mut block = chain.get_block(h).unwrap();
            block.body = json!("induced chain error");
            chain.store().overwrite(h, &block).unwrap();
        }
    }

    let chain = open_default(dir.path());
    assert_eq!(chain.validate_chain(), BTreeSet::from([2, 4, 7]));
    assert!(!chain.validate_block(4).valid);
    assert!(chain.validate_block(5).valid);
}

#[test]
fn resealed_tampering_still_breaks_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let chain = open_default(dir.path());
    for i in 0..6 {
        chain.add_block(i).unwrap();
    }

    // A careful attacker recomputes the edited block's own hash.
    let mut block = chain.get_block(3).unwrap();
    block.body = json!({"amount": 1_000_000});
    block.hash = block.compute_hash(chain.algorithm());
    chain.store().overwrite(3, &block).unwrap();

    assert!(chain.validate_block(3).valid);
    assert_eq!(chain.validate_chain(), BTreeSet::from([3]));
}

// ---------------------------------------------------------------------------
// Scenario: crash between delete and marker rewrite
// ---------------------------------------------------------------------------

#[test]
fn stale_tip_marker_is_repaired_on_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let chain = open_default(dir.path());
        for i in 0..3 {
            chain.add_block(i).unwrap();
        }
        chain.store().set_tip(Some(42)).unwrap();
    }

    let chain = open_default(dir.path());
    assert_eq!(chain.current_height(), 2);
    assert_eq!(chain.store().tip().unwrap(), Some(2));

    chain.add_block("continues at 3").unwrap();
    assert_eq!(chain.get_block(3).unwrap().height, 3);
}

// ---------------------------------------------------------------------------
// Scenario: iteration and teardown
// ---------------------------------------------------------------------------

#[test]
fn iterate_then_teardown() {
    let dir = tempfile::tempdir().unwrap();
    {
        let chain = open_default(dir.path());
        for i in 0..7 {
            chain.add_block(i).unwrap();
        }

        let heights: Vec<u64> = chain.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(heights, (0..7).collect::<Vec<_>>());

        assert_eq!(chain.teardown().unwrap(), 7);
        assert_eq!(chain.current_height(), -1);
    }

    let chain = open_default(dir.path());
    assert_eq!(chain.current_height(), -1);
    assert_eq!(chain.store().count().unwrap(), 0);
    assert!(matches!(chain.get_block(0), Err(ChainError::NotFound(0))));
}

// ---------------------------------------------------------------------------
// Scenario: concurrent writers on a durable store
// ---------------------------------------------------------------------------

#[test]
fn concurrent_writers_on_sled() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(open_default(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|w| {
            let chain = Arc::clone(&chain);
            thread::spawn(move || {
                for i in 0..10 {
                    chain.add_block(json!({"writer": w, "seq": i})).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(chain.current_height(), 39);
    assert_eq!(chain.store().count().unwrap(), 40);
    assert!(chain.validate_chain().is_empty());
}
