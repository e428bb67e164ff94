//! Signature pre-image construction: ZIP-143/243-style personalized
//! BLAKE2b digests for Overwinter/Sapling inputs, and the classic
//! double-SHA256 pre-image for legacy (pre-Overwinter) inputs.
//!
//! Grounded on the notion of transaction digest algorithm in
//! `bitcoinz_overwinter_builder.rs` (BLAKE2b personalization) and
//! `bitcoinz_legacy_builder.rs` (double-SHA256), generalized to the exact
//! field layout used by this wallet's `Transaction` model.

use crate::codec::Writer;
use crate::params::{self, Network};
use crate::tx::{Transaction, TxInput};
use blake2b_simd::Params as Blake2bParams;
use sha2::{Digest, Sha256};

pub const SIGHASH_ALL: u32 = 0x0000_0001;

fn blake2b_personal(personalization: &[u8; 16], data: &[u8]) -> [u8; 32] {
    let hash = Blake2bParams::new()
        .hash_length(32)
        .personal(personalization)
        .to_state()
        .update(data)
        .finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

fn personalization(prefix12: &[u8; 12], branch_id: u32) -> [u8; 16] {
    let mut p = [0u8; 16];
    p[..12].copy_from_slice(prefix12);
    p[12..].copy_from_slice(&branch_id.to_le_bytes());
    p
}

fn hash_prevouts(inputs: &[TxInput]) -> [u8; 32] {
    let mut w = Writer::new();
    for input in inputs {
        w.write_bytes(&input.prevout_hash);
        w.write_u32(input.prevout_n);
    }
    blake2b_personal(b"ZcashPrevoutHash", w.as_slice())
}

fn hash_sequence(inputs: &[TxInput]) -> [u8; 32] {
    let mut w = Writer::new();
    for input in inputs {
        w.write_u32(input.sequence);
    }
    blake2b_personal(b"ZcashSequencHash", w.as_slice())
}

fn hash_outputs(tx: &Transaction) -> [u8; 32] {
    let mut w = Writer::new();
    for output in &tx.outputs {
        w.write_i64(output.value);
        w.write_compact_size(output.script.len() as u64);
        w.write_bytes(&output.script);
    }
    blake2b_personal(b"ZcashOutputsHash", w.as_slice())
}

/// The ZIP-143/243 signature digest for spending input `input_index`,
/// where `script_code` is the script the signature is checked against
/// (usually the redeem/pubkey script of the coin being spent) and
/// `value` is that coin's value in zatoshi.
pub fn overwinter_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    value: i64,
    network: Network,
) -> [u8; 32] {
    let ov = tx
        .overwinter
        .as_ref()
        .expect("overwinter_sighash called on a non-overwintered transaction");
    let input = &tx.inputs[input_index];

    let mut w = Writer::new();
    w.write_u32(0x8000_0000 | tx.version);
    w.write_u32(ov.version_group_id);
    w.write_bytes(&hash_prevouts(&tx.inputs));
    w.write_bytes(&hash_sequence(&tx.inputs));
    w.write_bytes(&hash_outputs(tx));
    w.write_bytes(&[0u8; 32]); // hashJoinSplits
    w.write_bytes(&[0u8; 32]); // hashShieldedSpends
    w.write_bytes(&[0u8; 32]); // hashShieldedOutputs
    w.write_u32(tx.lock_time);
    w.write_u32(ov.expiry_height);
    w.write_i64(ov.value_balance.unwrap_or(0));
    w.write_u32(SIGHASH_ALL);
    w.write_bytes(&input.prevout_hash);
    w.write_u32(input.prevout_n);
    w.write_compact_size(script_code.len() as u64);
    w.write_bytes(script_code);
    w.write_i64(value);
    w.write_u32(input.sequence);

    let branch_id = branch_id_for(network);
    let personal = personalization(b"ZcashSigHash", branch_id);
    blake2b_personal(&personal, w.as_slice())
}

fn branch_id_for(_network: Network) -> u32 {
    params::BUBBLES_BRANCH_ID
}

/// The classic Bitcoin `SIGHASH_ALL` pre-image/digest for a legacy
/// (pre-Overwinter) input: double-SHA256 of the whole transaction with
/// every `script_sig` blanked except `input_index`'s, which is replaced
/// by `script_code`.
pub fn legacy_sighash(tx: &Transaction, input_index: usize, script_code: &[u8]) -> [u8; 32] {
    let mut w = Writer::new();
    w.write_u32(tx.version);
    w.write_compact_size(tx.inputs.len() as u64);
    for (i, input) in tx.inputs.iter().enumerate() {
        w.write_bytes(&input.prevout_hash);
        w.write_u32(input.prevout_n);
        if i == input_index {
            w.write_compact_size(script_code.len() as u64);
            w.write_bytes(script_code);
        } else {
            w.write_compact_size(0);
        }
        w.write_u32(input.sequence);
    }
    w.write_compact_size(tx.outputs.len() as u64);
    for output in &tx.outputs {
        w.write_i64(output.value);
        w.write_compact_size(output.script.len() as u64);
        w.write_bytes(&output.script);
    }
    w.write_u32(tx.lock_time);
    w.write_u32(SIGHASH_ALL);

    let first = Sha256::digest(w.as_slice());
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{InputKind, OutputKind, TxOutput};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 4,
            overwinter: Some(crate::tx::OverwinterFields {
                version_group_id: params::SAPLING_VERSION_GROUP_ID,
                expiry_height: 0,
                value_balance: Some(0),
                shielded_spends: Vec::new(),
                shielded_outputs: Vec::new(),
                join_splits: Default::default(),
                join_split_pubkey: None,
                join_split_sig: None,
                binding_sig: None,
            }),
            inputs: vec![TxInput {
                prevout_hash: [1u8; 32],
                prevout_n: 0,
                script_sig: Vec::new(),
                sequence: 0xffff_ffff,
                kind: InputKind::P2pkh {
                    pubkey: vec![0x02; 33],
                },
                num_sig: 1,
                x_pubkeys: vec![vec![0x02; 33]],
                pubkeys: vec![vec![0x02; 33]],
                signatures: vec![None],
            }],
            outputs: vec![TxOutput {
                value: 1000,
                kind: OutputKind::Script(Vec::new()),
                script: vec![0x76, 0xa9],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn overwinter_sighash_is_deterministic() {
        let tx = sample_tx();
        let script_code = vec![0x76, 0xa9, 0x14];
        let a = overwinter_sighash(&tx, 0, &script_code, 5000, Network::Mainnet);
        let b = overwinter_sighash(&tx, 0, &script_code, 5000, Network::Mainnet);
        assert_eq!(a, b);
    }

    #[test]
    fn overwinter_sighash_changes_with_value() {
        let tx = sample_tx();
        let script_code = vec![0x76, 0xa9, 0x14];
        let a = overwinter_sighash(&tx, 0, &script_code, 5000, Network::Mainnet);
        let b = overwinter_sighash(&tx, 0, &script_code, 6000, Network::Mainnet);
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_sighash_blanks_other_input_scripts() {
        let mut tx = sample_tx();
        tx.overwinter = None;
        tx.version = 1;
        tx.inputs.push(tx.inputs[0].clone());
        let script_code = vec![0x76, 0xa9, 0x14];
        let a = legacy_sighash(&tx, 0, &script_code);
        let b = legacy_sighash(&tx, 1, &script_code);
        assert_ne!(a, b);
    }
}
