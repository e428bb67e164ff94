//! Chunk and single-header PoW/continuity verification.
//!
//! Grounded on `verify_header`/`verify_chunk` in
//! `original_source/lib/blockchain.py`. `verify_chunk` keeps a scratch
//! overlay of the headers it has accepted so far in the current chunk, so
//! `compute_target` can see intra-chunk ancestors without the chunk having
//! been persisted yet — mirrors the source's `chunk_headers` dict, turned
//! into a small explicit overlay type per the dynamic-dict design note.

use crate::branch::Branch;
use crate::error::{CoreError, Result};
use crate::header::Header;
use crate::params::{self, Network};
use crate::pow::{self, HeaderSource};
use crate::store::{ChainStore, StoreHeaderSource};
use primitive_types::U256;
use std::collections::HashMap;
use std::sync::Arc;

/// `header.prev_block_hash` must equal `prev_hash`; on mainnet the bits and
/// the proof of work are additionally checked against `target` (itself
/// already carrying the DIFFADJ ramp override where applicable, since it
/// came out of `compute_target`). Testnet/regtest skip both of those.
pub fn verify_header(header: &Header, prev_hash: &str, target: U256, network: Network) -> Result<()> {
    let actual_prev = hex::encode(header.prev_block_hash);
    if actual_prev != prev_hash {
        return Err(CoreError::PrevHashMismatch {
            expected: prev_hash.to_string(),
            actual: actual_prev,
        });
    }
    if network.is_testnet() {
        return Ok(());
    }
    let expected_bits = pow::target_to_bits(target);
    if header.bits != expected_bits {
        return Err(CoreError::BitsMismatch {
            expected: expected_bits,
            actual: header.bits,
        });
    }
    if !pow::meets_target(header.hash(), target) {
        return Err(CoreError::InsufficientPoW {
            hash: header.hash_hex(),
            target: format!("{:x}", target),
        });
    }
    Ok(())
}

/// Overlays a chunk's about-to-be-committed headers over the persistent
/// store, so `compute_target` can walk back across headers that only
/// exist in this in-flight chunk so far.
struct ScratchSource<'a> {
    inner: StoreHeaderSource<'a>,
    scratch: HashMap<i64, (u32, u32)>,
}

impl<'a> HeaderSource for ScratchSource<'a> {
    fn bits_at(&self, height: i64) -> Result<u32> {
        if let Some((bits, _)) = self.scratch.get(&height) {
            return Ok(*bits);
        }
        self.inner.bits_at(height)
    }

    fn timestamp_at(&self, height: i64) -> Result<u32> {
        if let Some((_, ts)) = self.scratch.get(&height) {
            return Ok(*ts);
        }
        self.inner.timestamp_at(height)
    }
}

/// Validates a contiguous run of headers starting at `start_height`
/// against `branch`'s existing tip, without persisting anything. Returns
/// the parsed headers in order on success so the caller can hand the raw
/// bytes straight to `ChainStore::save_chunk`.
pub fn verify_chunk(
    store: &ChainStore,
    branch: &Arc<Branch>,
    start_height: i64,
    bytes: &[u8],
) -> Result<Vec<Header>> {
    let network = store.network();
    let mut source = ScratchSource {
        inner: StoreHeaderSource { store, branch },
        scratch: HashMap::new(),
    };

    let mut prev_hash = if start_height == 0 {
        "00".repeat(32)
    } else {
        store
            .get_hash(branch, start_height - 1)?
            .ok_or(CoreError::HeaderNotFound(start_height - 1))?
    };

    let mut headers = Vec::new();
    let mut cursor = 0usize;
    let mut height = start_height;
    while cursor < bytes.len() {
        let len = params::header_size(height);
        if cursor + len > bytes.len() {
            return Err(CoreError::SerializationError(format!(
                "chunk ends mid-header at height {}",
                height
            )));
        }
        let header = Header::deserialize(&bytes[cursor..cursor + len], height)?;

        if height == 0 {
            if header.hash_hex() != network.genesis_hash() {
                return Err(CoreError::PrevHashMismatch {
                    expected: network.genesis_hash().to_string(),
                    actual: header.hash_hex(),
                });
            }
        } else {
            let target = pow::compute_target(&source, height, network)?;
            verify_header(&header, &prev_hash, target, network)?;
        }

        source
            .scratch
            .insert(height, (header.bits, header.timestamp));
        prev_hash = header.hash_hex();
        headers.push(header);
        cursor += len;
        height += 1;
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::CheckpointTable;
    use tempfile::tempdir;

    fn header_at(height: i64, prev: [u8; 32], bits: u32, timestamp: u32) -> Header {
        let sol_len = params::header_size(height) - 143;
        Header {
            version: 4,
            prev_block_hash: prev,
            merkle_root: [0u8; 32],
            reserved_hash: [0u8; 32],
            timestamp,
            bits,
            nonce: [0u8; 32],
            solution: vec![0u8; sol_len],
        }
    }

    #[test]
    fn verify_header_rejects_prev_hash_mismatch() {
        let h = header_at(5, [9u8; 32], 0x1f07ffff, 1_600_000_000);
        let target = pow::bits_to_target(0x1f07ffff, Network::Mainnet).unwrap();
        let err = verify_header(&h, &"ab".repeat(32), target, Network::Mainnet).unwrap_err();
        assert!(matches!(err, CoreError::PrevHashMismatch { .. }));
    }

    #[test]
    fn verify_header_rejects_bits_mismatch() {
        let h = header_at(5, [0u8; 32], 0x1e0ffffe, 1_600_000_000);
        let target = pow::bits_to_target(0x1f07ffff, Network::Mainnet).unwrap();
        let prev = hex::encode([0u8; 32]);
        let err = verify_header(&h, &prev, target, Network::Mainnet).unwrap_err();
        assert!(matches!(err, CoreError::BitsMismatch { .. }));
    }

    #[test]
    fn testnet_skips_bits_and_pow_checks() {
        let h = header_at(5, [0u8; 32], 0xdeadbeef, 1_600_000_000);
        let target = pow::bits_to_target(0x1f07ffff, Network::Mainnet).unwrap();
        let prev = hex::encode([0u8; 32]);
        assert!(verify_header(&h, &prev, target, Network::Testnet).is_ok());
    }

    #[test]
    fn verify_chunk_accepts_a_genesis_and_one_follow_on_header() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().to_path_buf(), Network::Regtest, CheckpointTable::default()).unwrap();
        let root = store.root();

        let genesis_prev = [0u8; 32];
        let mut genesis = header_at(0, genesis_prev, 0x1f07ffff, 1_600_000_000);
        // Regtest genesis hash is fixed; build a header and then pretend the
        // network constant matches it by checking round-trip behavior on
        // the follow-on header only, which is what this test actually
        // exercises end to end.
        genesis.nonce = [1u8; 32];
        let genesis_bytes = genesis.serialize();
        root.save_header(0, &genesis_bytes).unwrap();

        let h1 = header_at(1, genesis.hash(), 0x1f07ffff, 1_600_000_150);
        let bytes = h1.serialize();
        let result = verify_chunk(&store, &root, 1, &bytes);
        assert!(result.is_ok());
    }
}
