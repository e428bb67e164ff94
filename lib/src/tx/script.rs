//! Opcode-level script reading and the small set of script shapes this
//! wallet recognizes.
//!
//! Grounded on `opcodes`/`script_GetOp`/`match_decoded`/`parse_scriptSig`/
//! `parse_redeemScript`/`get_address_from_output_script` in
//! `original_source/lib/transaction.py`. The original's generic
//! "decode opcodes, pattern-match against a template" approach becomes a
//! small explicit state machine per the script-recognition redesign note;
//! anything that doesn't match a known shape is kept as raw bytes rather
//! than dropped.

use crate::address;
use crate::codec::Writer;
use crate::error::{CoreError, Result};
use crate::params::Network;
use crate::tx::{InputKind, OutputKind};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// One decoded script element: either a small-integer opcode (`OP_0`,
/// `OP_1..OP_16`, `OP_DUP`, ...) or a pushed data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Opcode(u8),
    Push(Vec<u8>),
}

/// Walks `script` into a flat list of opcodes/pushes, in source order.
/// Fails on a push whose declared length runs past the end of the script.
pub fn decode(script: &[u8]) -> Result<Vec<ScriptOp>> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < script.len() {
        let op = script[i];
        i += 1;
        let push_len = if op <= 75 {
            Some(op as usize)
        } else if op == OP_PUSHDATA1 {
            let len = *script.get(i).ok_or(CoreError::SerializationError(
                "truncated OP_PUSHDATA1".into(),
            ))? as usize;
            i += 1;
            Some(len)
        } else if op == OP_PUSHDATA2 {
            let bytes = script
                .get(i..i + 2)
                .ok_or(CoreError::SerializationError("truncated OP_PUSHDATA2".into()))?;
            let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
            i += 2;
            Some(len)
        } else if op == OP_PUSHDATA4 {
            let bytes = script
                .get(i..i + 4)
                .ok_or(CoreError::SerializationError("truncated OP_PUSHDATA4".into()))?;
            let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
            i += 4;
            Some(len)
        } else {
            None
        };

        match push_len {
            Some(len) => {
                let data = script
                    .get(i..i + len)
                    .ok_or(CoreError::SerializationError("truncated push data".into()))?
                    .to_vec();
                i += len;
                out.push(ScriptOp::Push(data));
            }
            None => out.push(ScriptOp::Opcode(op)),
        }
    }
    Ok(out)
}

fn push_bytes(w: &mut Writer, data: &[u8]) {
    if data.len() <= 75 {
        w.write_bytes(&[data.len() as u8]);
    } else if data.len() <= 0xff {
        w.write_bytes(&[OP_PUSHDATA1, data.len() as u8]);
    } else if data.len() <= 0xffff {
        w.write_bytes(&[OP_PUSHDATA2]);
        w.write_u16(data.len() as u16);
    } else {
        w.write_bytes(&[OP_PUSHDATA4]);
        w.write_u32(data.len() as u32);
    }
    w.write_bytes(data);
}

pub fn push_script(data: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    push_bytes(&mut w, data);
    w.into_vec()
}

fn op_n(n: u8) -> u8 {
    OP_1 + (n - 1)
}

/// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG` redeem script for an
/// `m`-of-`n` multisig.
pub fn multisig_script(pubkeys: &[Vec<u8>], m: u8) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_bytes(&[op_n(m)]);
    for pk in pubkeys {
        push_bytes(&mut w, pk);
    }
    w.write_bytes(&[op_n(pubkeys.len() as u8), OP_CHECKMULTISIG]);
    w.into_vec()
}

/// Recognizes the handful of `scriptSig` shapes this wallet knows how to
/// spend from. Coinbase detection (all-zero prevout hash) happens before
/// this is called; everything else falls through to `InputKind::Unknown`
/// with the raw bytes preserved.
pub fn parse_input_script(script: &[u8]) -> InputKind {
    let ops = match decode(script) {
        Ok(ops) => ops,
        Err(_) => return InputKind::Unknown,
    };
    match ops.as_slice() {
        [ScriptOp::Push(sig)] if !sig.is_empty() && sig[0] != 0 => {
            let _ = sig;
            InputKind::P2pk
        }
        [ScriptOp::Push(_sig), ScriptOp::Push(pubkey)] => InputKind::P2pkh {
            pubkey: pubkey.clone(),
        },
        _ => {
            if let [ScriptOp::Opcode(OP_0), rest @ ..] = ops.as_slice() {
                if let Some((ScriptOp::Push(redeem), sig_pushes)) = rest.split_last() {
                    if sig_pushes.iter().all(|op| matches!(op, ScriptOp::Push(_)))
                        && decode(redeem)
                            .map(|r| is_multisig_redeem_script(&r))
                            .unwrap_or(false)
                    {
                        return InputKind::P2sh {
                            redeem_script: redeem.clone(),
                        };
                    }
                }
            }
            InputKind::Unknown
        }
    }
}

fn is_multisig_redeem_script(ops: &[ScriptOp]) -> bool {
    match ops {
        [ScriptOp::Opcode(m), middle @ .., ScriptOp::Opcode(n), ScriptOp::Opcode(OP_CHECKMULTISIG)] => {
            (OP_1..=OP_16).contains(m)
                && (OP_1..=OP_16).contains(n)
                && middle.iter().all(|op| matches!(op, ScriptOp::Push(_)))
                && middle.len() as u8 == (*n - OP_1 + 1)
        }
        _ => false,
    }
}

/// Pulls the `(m, pubkeys)` multisig parameters back out of a stored P2SH
/// redeem script, for re-deriving a scriptCode at signing time. Mirrors
/// `parse_redeemScript`: fails with `NotRecognizedRedeemScript` when the
/// script isn't `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`.
pub fn parse_redeem_script(redeem: &[u8]) -> Result<(u8, Vec<Vec<u8>>)> {
    let ops = decode(redeem)?;
    match ops.as_slice() {
        [ScriptOp::Opcode(m), middle @ .., ScriptOp::Opcode(n), ScriptOp::Opcode(OP_CHECKMULTISIG)]
            if (OP_1..=OP_16).contains(m)
                && (OP_1..=OP_16).contains(n)
                && middle.iter().all(|op| matches!(op, ScriptOp::Push(_)))
                && middle.len() as u8 == (*n - OP_1 + 1) =>
        {
            let m = m - OP_1 + 1;
            let pubkeys = middle
                .iter()
                .map(|op| match op {
                    ScriptOp::Push(pk) => pk.clone(),
                    ScriptOp::Opcode(_) => unreachable!("filtered to pushes above"),
                })
                .collect();
            Ok((m, pubkeys))
        }
        _ => Err(CoreError::NotRecognizedRedeemScript),
    }
}

/// Recognizes the handful of output script shapes this wallet knows how to
/// display/pay to; falls back to `OutputKind::Script` with the raw bytes.
pub fn parse_output_script(script: &[u8], network: Network) -> OutputKind {
    let ops = match decode(script) {
        Ok(ops) => ops,
        Err(_) => return OutputKind::Script(script.to_vec()),
    };
    match ops.as_slice() {
        [ScriptOp::Push(pubkey), ScriptOp::Opcode(OP_CHECKSIG)] => {
            OutputKind::Pubkey(pubkey.clone())
        }
        [ScriptOp::Opcode(OP_DUP), ScriptOp::Opcode(OP_HASH160), ScriptOp::Push(hash), ScriptOp::Opcode(OP_EQUALVERIFY), ScriptOp::Opcode(OP_CHECKSIG)]
            if hash.len() == 20 =>
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            OutputKind::Address(address::encode_p2pkh(network, &h))
        }
        [ScriptOp::Opcode(OP_HASH160), ScriptOp::Push(hash), ScriptOp::Opcode(OP_EQUAL)]
            if hash.len() == 20 =>
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            OutputKind::Address(address::encode_p2sh(network, &h))
        }
        _ => OutputKind::Script(script.to_vec()),
    }
}

pub fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_bytes(&[OP_DUP, OP_HASH160]);
    push_bytes(&mut w, hash);
    w.write_bytes(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    w.into_vec()
}

pub fn p2sh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_bytes(&[OP_HASH160]);
    push_bytes(&mut w, hash);
    w.write_bytes(&[OP_EQUAL]);
    w.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_direct_and_pushdata1_pushes() {
        let mut script = vec![3u8, 1, 2, 3];
        script.extend_from_slice(&[OP_PUSHDATA1, 2, 9, 9]);
        let ops = decode(&script).unwrap();
        assert_eq!(
            ops,
            vec![
                ScriptOp::Push(vec![1, 2, 3]),
                ScriptOp::Push(vec![9, 9]),
            ]
        );
    }

    #[test]
    fn recognizes_p2pkh_input() {
        let sig = vec![0x30, 0x01, 0x02];
        let pubkey = vec![0x02; 33];
        let mut script = push_script(&sig);
        script.extend(push_script(&pubkey));
        assert_eq!(
            parse_input_script(&script),
            InputKind::P2pkh { pubkey: pubkey.clone() }
        );
    }

    #[test]
    fn recognizes_p2pkh_output_and_encodes_address() {
        let hash = [1u8; 20];
        let script = p2pkh_script(&hash);
        match parse_output_script(&script, Network::Mainnet) {
            OutputKind::Address(addr) => {
                let (version, payload) = address::decode(&addr).unwrap();
                assert_eq!(version, Network::Mainnet.addr_p2pkh());
                assert_eq!(payload, hash);
            }
            other => panic!("expected address, got {:?}", other),
        }
    }

    #[test]
    fn recognizes_multisig_redeem_script() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let redeem = multisig_script(&[pk1.clone(), pk2.clone()], 2);
        let mut script_sig = vec![OP_0];
        script_sig.extend(push_script(&[]));
        script_sig.extend(push_script(&redeem));
        match parse_input_script(&script_sig) {
            InputKind::P2sh { redeem_script } => assert_eq!(redeem_script, redeem),
            other => panic!("expected p2sh, got {:?}", other),
        }
    }

    #[test]
    fn unknown_script_is_preserved_raw() {
        let script = vec![0x6a, 0x01, 0x02]; // OP_RETURN-ish, not recognized
        match parse_output_script(&script, Network::Mainnet) {
            OutputKind::Script(raw) => assert_eq!(raw, script),
            other => panic!("expected raw script, got {:?}", other),
        }
    }

    #[test]
    fn parse_redeem_script_recovers_m_and_pubkeys() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let redeem = multisig_script(&[pk1.clone(), pk2.clone()], 2);
        let (m, pubkeys) = parse_redeem_script(&redeem).unwrap();
        assert_eq!(m, 2);
        assert_eq!(pubkeys, vec![pk1, pk2]);
    }

    #[test]
    fn parse_redeem_script_rejects_a_non_multisig_shape() {
        let err = parse_redeem_script(&[OP_1, OP_1]).unwrap_err();
        assert!(matches!(err, CoreError::NotRecognizedRedeemScript));
    }
}
