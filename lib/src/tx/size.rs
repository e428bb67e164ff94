//! Fee-estimation helpers: estimated transaction size/weight for
//! transactions that may still have unsigned inputs.
//!
//! Grounded on `Transaction.estimated_size`/`estimated_weight`/
//! `virtual_size_from_weight`/`estimated_input_weight`/`estimated_output_size`
//! in `original_source/lib/transaction.py`. This chain carries no segwit
//! witness data, so base size and total size always coincide; the
//! weight/virtual-size formulas are kept anyway so a caller who later adds
//! a witness-bearing variant has the right shape to extend.

use crate::tx::{InputKind, Transaction, TxInput, TxOutput};

/// A conservative estimate of a DER-encoded ECDSA signature plus its
/// trailing sighash-type byte (up to 72 bytes DER + 1).
const ESTIMATED_SIG_SIZE: usize = 73;
const COMPRESSED_PUBKEY_SIZE: usize = 33;

fn compact_size_len(n: usize) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Estimated `scriptSig` length for an input that may not be fully signed
/// yet: actual bytes once complete, otherwise a worst-case placeholder
/// sized from the recognized kind.
fn estimated_script_sig_len(input: &TxInput) -> usize {
    if input.is_coinbase() || input.is_complete() {
        return input.script_sig.len();
    }
    match &input.kind {
        InputKind::P2pk => 1 + ESTIMATED_SIG_SIZE,
        InputKind::P2pkh { .. } => 2 + ESTIMATED_SIG_SIZE + COMPRESSED_PUBKEY_SIZE,
        InputKind::P2sh { redeem_script } => {
            let n = input.num_sig.max(input.pubkeys.len() as u8) as usize;
            1 + n * (1 + ESTIMATED_SIG_SIZE) + compact_size_len(redeem_script.len())
                + redeem_script.len()
        }
        InputKind::Unknown | InputKind::Coinbase => input.script_sig.len(),
    }
}

fn estimated_input_size(input: &TxInput) -> usize {
    let script_len = estimated_script_sig_len(input);
    32 + 4 + compact_size_len(script_len) + script_len + 4
}

fn estimated_output_size(output: &TxOutput) -> usize {
    8 + compact_size_len(output.script.len()) + output.script.len()
}

/// `weight / 4` rounded up, per BIP-0141's virtual-size definition.
pub fn virtual_size_from_weight(weight: usize) -> usize {
    weight / 4 + usize::from(weight % 4 > 0)
}

/// Estimated total transaction size in bytes (base and total size
/// coincide since this chain has no witness data).
pub fn estimated_total_size(tx: &Transaction) -> usize {
    let mut size = 4; // version (+overwintered flag)
    if let Some(ov) = &tx.overwinter {
        size += 4; // version_group_id
        size += 4; // expiry_height
        if tx.version == 4 {
            size += 8; // value_balance
            size += compact_size_len(0) + (ov.shielded_spends.len());
            size += compact_size_len(0) + (ov.shielded_outputs.len());
        }
        size += compact_size_len(ov.join_splits.count()) + join_splits_byte_len(ov);
        if ov.join_splits.count() > 0 {
            size += 32 + 64;
            if tx.version == 4 {
                size += 64;
            }
        }
    }
    size += compact_size_len(tx.inputs.len());
    size += tx.inputs.iter().map(estimated_input_size).sum::<usize>();
    size += compact_size_len(tx.outputs.len());
    size += tx.outputs.iter().map(estimated_output_size).sum::<usize>();
    size += 4; // lock_time
    size
}

fn join_splits_byte_len(ov: &crate::tx::OverwinterFields) -> usize {
    use crate::tx::{JoinSplits, JOIN_SPLIT_V3_SIZE, JOIN_SPLIT_V4_SIZE};
    match &ov.join_splits {
        JoinSplits::None => 0,
        JoinSplits::ParsedV3(list) => list.len() * JOIN_SPLIT_V3_SIZE,
        JoinSplits::OpaqueV4(blobs) => blobs.len() * JOIN_SPLIT_V4_SIZE,
    }
}

pub fn estimated_weight(tx: &Transaction) -> usize {
    let total = estimated_total_size(tx);
    3 * total + total
}

pub fn estimated_size(tx: &Transaction) -> usize {
    virtual_size_from_weight(estimated_weight(tx))
}
