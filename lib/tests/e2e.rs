//! End-to-end scenarios and cross-module invariants that don't fit neatly
//! into any one module's `#[cfg(test)]` block: URI parsing, satoshi
//! formatting, the DIFFADJ ramp at its activation height, and a full
//! multi-branch reorg through `ChainStore`.

use tempfile::tempdir;
use zclassic_light_core::checkpoints::CheckpointTable;
use zclassic_light_core::format::format_satoshis;
use zclassic_light_core::header::Header;
use zclassic_light_core::params::{self, Network};
use zclassic_light_core::pow::{self, HeaderSource};
use zclassic_light_core::uri::{self};
use zclassic_light_core::{CoreError, ChainStore};

#[test]
fn uri_parses_address_and_amount() {
    let uri = "zcash:t1NdvKvSnnBoJ7D9nfJSX5kK7GEGNs1bY4S?amount=0.0003";
    let parsed = uri::parse(uri).unwrap();
    assert_eq!(parsed.address, "t1NdvKvSnnBoJ7D9nfJSX5kK7GEGNs1bY4S");
    assert_eq!(parsed.amount, Some(30_000));
}

#[test]
fn uri_rejects_duplicate_parameter() {
    let uri = "zcash:t1NdvKvSnnBoJ7D9nfJSX5kK7GEGNs1bY4S?amount=0.0003&amount=30.0";
    let err = uri::parse(uri).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateParameter(ref k) if k == "amount"));
}

#[test]
fn satoshi_formatting_matches_spec_examples() {
    assert_eq!(format_satoshis(1234, false), "0.00001234");
    assert_eq!(format_satoshis(-1234, true), "-0.00001234");
}

#[test]
fn bits_edge_case_decodes_to_the_classic_pow_limit_and_back() {
    let target = pow::bits_to_target(0x1d00ffff, Network::Mainnet).unwrap();
    let mut expected = [0u8; 32];
    expected[4] = 0xff;
    expected[5] = 0xff;
    let mut bytes = [0u8; 32];
    target.to_big_endian(&mut bytes);
    assert_eq!(bytes, expected);
    assert_eq!(pow::target_to_bits(target), 0x1d00ffff);
}

struct FlatHistory {
    bits: u32,
    timestamps: Vec<u32>,
}

impl HeaderSource for FlatHistory {
    fn bits_at(&self, _height: i64) -> zclassic_light_core::Result<u32> {
        Ok(self.bits)
    }
    fn timestamp_at(&self, height: i64) -> zclassic_light_core::Result<u32> {
        Ok(self.timestamps[height.max(0) as usize])
    }
}

#[test]
fn diffadj_ramp_overrides_the_computed_retarget_at_activation() {
    // The ramp table short-circuits `compute_target` for this window, so
    // `compute_target` never consults `FlatHistory` here; its contents are
    // irrelevant.
    let history = FlatHistory {
        bits: 0x1f07ffff,
        timestamps: vec![1_600_000_000],
    };
    let target_322 =
        pow::compute_target(&history, params::DIFFADJ_ACTIVATION_HEIGHT, Network::Mainnet).unwrap();
    assert_eq!(target_322, pow::bits_to_target(0x1f07ffff, Network::Mainnet).unwrap());

    let target_323 = pow::compute_target(
        &history,
        params::DIFFADJ_ACTIVATION_HEIGHT + 1,
        Network::Mainnet,
    )
    .unwrap();
    assert_eq!(
        target_323,
        pow::bits_to_target(0x1e0ffffe, Network::Mainnet).unwrap()
    );
}

fn sample_header(height: i64, prev: [u8; 32], timestamp: u32) -> Header {
    let sol_len = params::header_size(height) - 143;
    Header {
        version: 4,
        prev_block_hash: prev,
        merkle_root: [0u8; 32],
        reserved_hash: [0u8; 32],
        timestamp,
        bits: 0x1f07ffff,
        nonce: [0u8; 32],
        solution: vec![0u8; sol_len],
    }
}

/// Builds a short honest chain, forks off it with a longer alternative,
/// and checks that after the fork outgrows its parent, `get_hash` on the
/// root for every height up to the new tip matches the winning chain and
/// the losing chain survives as an orphaned branch off the same parent.
#[test]
fn reorg_promotes_the_longer_branch_and_keeps_the_loser_addressable() {
    let dir = tempdir().unwrap();
    let store =
        ChainStore::open(dir.path().to_path_buf(), Network::Regtest, CheckpointTable::default())
            .unwrap();
    let root = store.root();

    let h0 = sample_header(0, [0u8; 32], 1_600_000_000);
    let h1 = sample_header(1, h0.hash(), 1_600_000_150);
    root.save_header(0, &h0.serialize()).unwrap();
    root.save_header(1, &h1.serialize()).unwrap();

    let fork = store.new_fork(0, 1).unwrap();
    let alt1 = sample_header(1, h0.hash(), 1_600_000_150);
    let alt2 = sample_header(2, alt1.hash(), 1_600_000_300);
    let alt3 = sample_header(3, alt2.hash(), 1_600_000_450);
    fork.save_header(1, &alt1.serialize()).unwrap();
    fork.save_header(2, &alt2.serialize()).unwrap();
    fork.save_header(3, &alt3.serialize()).unwrap();

    store.swap_with_parent(1).unwrap();

    assert_eq!(store.read_header(&root, 0).unwrap().unwrap(), h0);
    assert_eq!(store.read_header(&root, 1).unwrap().unwrap(), alt1);
    assert_eq!(store.read_header(&root, 2).unwrap().unwrap(), alt2);
    assert_eq!(store.read_header(&root, 3).unwrap().unwrap(), alt3);

    let loser = store.branch(1).unwrap();
    assert_eq!(loser.height(), 1);
    assert_eq!(loser.read_at_height(1).unwrap().unwrap(), h1.serialize());
}
