//! The frozen table of known-good chunk checkpoints.
//!
//! Grounded on `blockchain_headers_checkpoints`/`get_checkpoints` usage in
//! `original_source/lib/blockchain.py`: one entry per 100-block chunk below
//! a trusted horizon, each carrying the hash of its last header plus enough
//! `bits` to let `compute_target` see real ancestors across a checkpoint
//! boundary without touching disk.

use crate::params::CHUNK_LEN;
use serde::{Deserialize, Serialize};

/// One 100-header chunk's checkpoint: the chunk's closing hash and target,
/// plus the handful of trailing headers needed to retarget just past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub chunk_hash: String,
    pub chunk_bits: u32,
    /// `(height, bits, timestamp)` for the headers immediately preceding
    /// this checkpoint's boundary, oldest first, so `compute_target` can
    /// retarget the first live headers after it.
    pub extra_headers: Vec<ExtraHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraHeader {
    pub height: i64,
    pub bits: u32,
    pub timestamp: u32,
}

/// An ordered, immutable table of checkpoints, indexed by chunk number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointTable {
    entries: Vec<CheckpointEntry>,
}

impl CheckpointTable {
    pub fn new(entries: Vec<CheckpointEntry>) -> CheckpointTable {
        CheckpointTable { entries }
    }

    pub fn from_json(json: &str) -> serde_json::Result<CheckpointTable> {
        let entries: Vec<CheckpointEntry> = serde_json::from_str(json)?;
        Ok(CheckpointTable { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, chunk_index: usize) -> Option<&CheckpointEntry> {
        self.entries.get(chunk_index)
    }

    /// The height below which `get_hash` can be answered purely from this
    /// table, leaving a `POW_AVERAGING_WINDOW + POW_MEDIAN_BLOCK_SPAN`
    /// buffer so the retarget always has real headers to average.
    pub fn horizon(&self, retarget_buffer: i64) -> i64 {
        self.entries.len() as i64 * CHUNK_LEN - retarget_buffer
    }

    /// Look up the frozen hash for `height`, if it falls on a chunk
    /// boundary below the trusted horizon: `(height + 1) % 100 == 0` and
    /// `height < horizon`.
    pub fn hash_at(&self, height: i64, retarget_buffer: i64) -> Option<&str> {
        if height < 0 || height >= self.horizon(retarget_buffer) {
            return None;
        }
        if (height + 1) % CHUNK_LEN != 0 {
            return None;
        }
        let chunk_index = (height / CHUNK_LEN) as usize;
        self.entries.get(chunk_index).map(|e| e.chunk_hash.as_str())
    }

    /// `extra_headers` entries covering `height`, for retargeting inside
    /// the window just before a checkpoint boundary.
    pub fn extra_header_at(&self, height: i64) -> Option<&ExtraHeader> {
        if height < 0 {
            return None;
        }
        // Chunk `i` covers heights `[i*CHUNK_LEN, i*CHUNK_LEN + CHUNK_LEN - 1]`
        // and carries `extra_headers` for the tail of that same range
        // (including its own closing height), so the boundary height
        // itself — e.g. 99 for chunk 0 — must still resolve to chunk 0,
        // not `(height + 1) / CHUNK_LEN`.
        let chunk_index = (height / CHUNK_LEN) as usize;
        self.entries
            .get(chunk_index)?
            .extra_headers
            .iter()
            .find(|h| h.height == height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CheckpointTable {
        CheckpointTable::new(vec![CheckpointEntry {
            chunk_hash: "00".repeat(32),
            chunk_bits: 0x1f07ffff,
            extra_headers: vec![
                ExtraHeader {
                    height: 85,
                    bits: 0x1f07ffff,
                    timestamp: 1_600_000_000,
                },
                ExtraHeader {
                    height: 99,
                    bits: 0x1e0ffffe,
                    timestamp: 1_600_002_000,
                },
            ],
        }])
    }

    #[test]
    fn extra_header_lookup_resolves_the_exact_chunk_boundary_height() {
        // Height 99 is the *closing* height of chunk 0, not the first
        // height of chunk 1 — `(99 + 1) / CHUNK_LEN` would wrongly land
        // on chunk 1 and miss this entry.
        let t = table();
        assert_eq!(t.extra_header_at(99).unwrap().bits, 0x1e0ffffe);
    }

    #[test]
    fn hash_at_only_matches_chunk_boundaries_below_horizon() {
        let t = table();
        assert_eq!(t.hash_at(99, 28), None);
        assert_eq!(t.hash_at(99, 0), Some("00".repeat(32)).as_deref());
        assert_eq!(t.hash_at(98, 0), None);
    }

    #[test]
    fn extra_header_lookup_finds_the_matching_height() {
        let t = table();
        assert_eq!(t.extra_header_at(85).unwrap().bits, 0x1f07ffff);
        assert!(t.extra_header_at(84).is_none());
    }

    #[test]
    fn json_round_trip() {
        let t = table();
        let json = serde_json::to_string(&t.entries).unwrap();
        let parsed = CheckpointTable::from_json(&json).unwrap();
        assert_eq!(parsed.len(), t.len());
    }
}
