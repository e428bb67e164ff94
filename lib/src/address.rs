//! Base58Check address encoding.
//!
//! Grounded on the version-byte + double-SHA256-checksum pattern in
//! `bitcoinz_js_bridge.rs`'s `to_base58` usage, generalized to this chain's
//! two-byte address version prefixes (`Network::addr_p2pkh`/`addr_p2sh`)
//! instead of the single-byte prefixes Bitcoin itself uses.

use crate::error::{CoreError, Result};
use base58::{FromBase58, ToBase58};
use ripemd160::{Digest as _, Ripemd160};
use sha2::{Digest, Sha256};

pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

/// `base58(version || payload || checksum)` where `checksum` is the first
/// four bytes of `double_sha256(version || payload)`.
pub fn encode(version: &[u8], payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(version.len() + payload.len() + 4);
    buf.extend_from_slice(version);
    buf.extend_from_slice(payload);
    let checksum = Sha256::digest(Sha256::digest(&buf));
    buf.extend_from_slice(&checksum[..4]);
    buf.to_base58()
}

pub fn encode_p2pkh(network: crate::params::Network, hash: &[u8; 20]) -> String {
    encode(&network.addr_p2pkh(), hash)
}

pub fn encode_p2sh(network: crate::params::Network, hash: &[u8; 20]) -> String {
    encode(&network.addr_p2sh(), hash)
}

/// Decodes and checksum-verifies a Base58Check string, returning the raw
/// `(version_bytes, payload)` split at the network's two-byte prefix width.
pub fn decode(addr: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let raw = addr
        .from_base58()
        .map_err(|_| CoreError::InvalidURI(format!("not valid base58: {}", addr)))?;
    if raw.len() < 6 {
        return Err(CoreError::InvalidURI(format!("address too short: {}", addr)));
    }
    let (body, checksum) = raw.split_at(raw.len() - 4);
    let expected = Sha256::digest(Sha256::digest(body));
    if &expected[..4] != checksum {
        return Err(CoreError::InvalidURI(format!(
            "bad checksum in address: {}",
            addr
        )));
    }
    let version = body[..2].to_vec();
    let payload = body[2..].to_vec();
    Ok((version, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Network;

    #[test]
    fn p2pkh_round_trips_through_decode() {
        let hash = [7u8; 20];
        let addr = encode_p2pkh(Network::Mainnet, &hash);
        let (version, payload) = decode(&addr).unwrap();
        assert_eq!(version, Network::Mainnet.addr_p2pkh());
        assert_eq!(payload, hash);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let hash = [7u8; 20];
        let mut addr = encode_p2pkh(Network::Mainnet, &hash);
        addr.push('1');
        assert!(decode(&addr).is_err());
    }
}
