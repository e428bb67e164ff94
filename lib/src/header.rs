//! Header record: fixed-layout wire format and display hash.
//!
//! Ground truth is `serialize_header`/`deserialize_header`/`hash_header` in
//! `original_source/lib/blockchain.py`. The `prev_block_hash`, `merkle_root`,
//! `reserved_hash` and `nonce` fields are kept here in *display* order (as a
//! block explorer would print them) and byte-reversed on the wire, matching
//! the Bitcoin-family convention; `sol_size`/`solution` are not hashes and
//! are carried in wire order with no reversal.

use crate::codec::{Cursor, Writer};
use crate::error::{CoreError, Result};
use crate::params;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub reserved_hash: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: [u8; 32],
    pub solution: Vec<u8>,
}

fn reversed(bytes: &[u8; 32]) -> [u8; 32] {
    let mut out = *bytes;
    out.reverse();
    out
}

impl Header {
    /// Total on-disk size of this header at `height` (1487 or 543 bytes).
    pub fn wire_len(&self, height: i64) -> usize {
        params::header_size(height)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(self.version);
        w.write_bytes(&reversed(&self.prev_block_hash));
        w.write_bytes(&reversed(&self.merkle_root));
        w.write_bytes(&reversed(&self.reserved_hash));
        w.write_u32(self.timestamp);
        w.write_u32(self.bits);
        w.write_bytes(&reversed(&self.nonce));
        w.write_compact_size(self.solution.len() as u64);
        w.write_bytes(&self.solution);
        w.into_vec()
    }

    pub fn deserialize(bytes: &[u8], height: i64) -> Result<Header> {
        let expected = params::header_size(height);
        if bytes.len() != expected {
            return Err(CoreError::BadHeaderLength {
                expected,
                actual: bytes.len(),
            });
        }
        let mut c = Cursor::new(bytes);
        let version = c.read_u32()?;
        let prev_block_hash = reversed(&c.read_array::<32>()?);
        let merkle_root = reversed(&c.read_array::<32>()?);
        let reserved_hash = reversed(&c.read_array::<32>()?);
        let timestamp = c.read_u32()?;
        let bits = c.read_u32()?;
        let nonce = reversed(&c.read_array::<32>()?);
        let sol_len = c.read_compact_size()? as usize;
        let solution = c.read_bytes(sol_len)?.to_vec();
        if !c.is_empty() {
            return Err(CoreError::SerializationError(
                "trailing bytes after header solution".into(),
            ));
        }
        Ok(Header {
            version,
            prev_block_hash,
            merkle_root,
            reserved_hash,
            timestamp,
            bits,
            nonce,
            solution,
        })
    }

    /// Double-SHA256 of the wire serialization, returned in display order
    /// (reversed relative to the raw digest, as block hashes are printed).
    pub fn hash(&self) -> [u8; 32] {
        let first = Sha256::digest(self.serialize());
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        out.reverse();
        out
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}
