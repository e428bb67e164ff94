//! Transaction (de)serialization across legacy/Overwinter/Sapling versions.
//!
//! Grounded on `BCDataStream`-driven `Transaction.deserialize`/`serialize`
//! in `original_source/lib/transaction.py`. Every input/output keeps its
//! raw script bytes alongside the recognized `kind`, so `serialize` is
//! always a faithful round trip even for scripts this wallet doesn't
//! otherwise understand.

use crate::codec::{Cursor, Writer};
use crate::error::{CoreError, Result};
use crate::params::{self, Network};
use crate::tx::script::{self, ScriptOp};
use crate::tx::{
    InputKind, JoinSplitV3, JoinSplits, OutputKind, OverwinterFields, Transaction, TxInput,
    TxOutput, JOIN_SPLIT_V3_SIZE, JOIN_SPLIT_V4_SIZE, SHIELDED_OUTPUT_SIZE, SHIELDED_SPEND_SIZE,
};

const OVERWINTERED_FLAG: u32 = 0x8000_0000;

fn parse_input(c: &mut Cursor, network: Network) -> Result<TxInput> {
    let prevout_hash: [u8; 32] = c.read_array()?;
    let prevout_n = c.read_u32()?;
    let script_len = c.read_compact_size()? as usize;
    let script_sig = c.read_bytes(script_len)?.to_vec();
    let sequence = c.read_u32()?;

    if prevout_hash == [0u8; 32] {
        return Ok(TxInput {
            prevout_hash,
            prevout_n,
            script_sig,
            sequence,
            kind: InputKind::Coinbase,
            num_sig: 0,
            x_pubkeys: Vec::new(),
            pubkeys: Vec::new(),
            signatures: Vec::new(),
        });
    }

    let kind = script::parse_input_script(&script_sig);
    let (num_sig, x_pubkeys, pubkeys, signatures) = match &kind {
        InputKind::P2pk => (1u8, Vec::new(), Vec::new(), vec![sig_slot(&script_sig)]),
        InputKind::P2pkh { pubkey } => (
            1u8,
            vec![pubkey.clone()],
            vec![pubkey.clone()],
            vec![sig_slot(&script_sig)],
        ),
        InputKind::P2sh { redeem_script } => {
            let (m, keys) = multisig_parties(redeem_script).unwrap_or((0, Vec::new()));
            let sigs = multisig_signatures(&script_sig, keys.len());
            (m, keys.clone(), keys, sigs)
        }
        InputKind::Unknown | InputKind::Coinbase => (0, Vec::new(), Vec::new(), Vec::new()),
    };
    let _ = network;
    Ok(TxInput {
        prevout_hash,
        prevout_n,
        script_sig,
        sequence,
        kind,
        num_sig,
        x_pubkeys,
        pubkeys,
        signatures,
    })
}

/// For a bare `p2pk`/`p2pkh` scriptSig the single signature push, if the
/// script has already been signed (a one-byte placeholder never appears
/// here since unsigned inputs carry an empty scriptSig instead).
fn sig_slot(script_sig: &[u8]) -> Option<Vec<u8>> {
    match script::decode(script_sig) {
        Ok(ops) => match ops.first() {
            Some(ScriptOp::Push(sig)) if !sig.is_empty() => Some(sig.clone()),
            _ => None,
        },
        Err(_) => None,
    }
}

fn multisig_parties(redeem_script: &[u8]) -> Option<(u8, Vec<Vec<u8>>)> {
    let ops = script::decode(redeem_script).ok()?;
    match ops.as_slice() {
        [ScriptOp::Opcode(m), middle @ .., ScriptOp::Opcode(_n), ScriptOp::Opcode(script::OP_CHECKMULTISIG)] =>
        {
            let keys = middle
                .iter()
                .map(|op| match op {
                    ScriptOp::Push(k) => Some(k.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some((m - script::OP_1 + 1, keys))
        }
        _ => None,
    }
}

fn multisig_signatures(script_sig: &[u8], num_keys: usize) -> Vec<Option<Vec<u8>>> {
    let ops = match script::decode(script_sig) {
        Ok(ops) => ops,
        Err(_) => return vec![None; num_keys],
    };
    // OP_0 <sig>... <redeem_script>
    let sigs: Vec<Option<Vec<u8>>> = ops
        .iter()
        .skip(1)
        .take(ops.len().saturating_sub(2))
        .map(|op| match op {
            ScriptOp::Push(data) if data.as_slice() != [crate::tx::sign::NO_SIGNATURE] => {
                Some(data.clone())
            }
            _ => None,
        })
        .collect();
    let mut out = sigs;
    out.resize(num_keys, None);
    out
}

fn write_input(w: &mut Writer, input: &TxInput) {
    w.write_bytes(&input.prevout_hash);
    w.write_u32(input.prevout_n);
    w.write_compact_size(input.script_sig.len() as u64);
    w.write_bytes(&input.script_sig);
    w.write_u32(input.sequence);
}

fn parse_output(c: &mut Cursor, network: Network) -> Result<TxOutput> {
    let value = c.read_i64()?;
    let script_len = c.read_compact_size()? as usize;
    let script = c.read_bytes(script_len)?.to_vec();
    let kind = script::parse_output_script(&script, network);
    Ok(TxOutput { value, kind, script })
}

fn write_output(w: &mut Writer, output: &TxOutput) {
    w.write_i64(output.value);
    w.write_compact_size(output.script.len() as u64);
    w.write_bytes(&output.script);
}

fn parse_join_split_v3(c: &mut Cursor) -> Result<JoinSplitV3> {
    Ok(JoinSplitV3 {
        vpub_old: c.read_u64()?,
        vpub_new: c.read_u64()?,
        anchor: c.read_array()?,
        nullifiers: [c.read_array()?, c.read_array()?],
        commitments: [c.read_array()?, c.read_array()?],
        ephemeral_key: c.read_array()?,
        random_seed: c.read_array()?,
        vmacs: [c.read_array()?, c.read_array()?],
        zkproof: c.read_bytes(296)?.to_vec(),
        enc_ciphertexts: [
            c.read_bytes(601)?.to_vec(),
            c.read_bytes(601)?.to_vec(),
        ],
    })
}

fn write_join_split_v3(w: &mut Writer, js: &JoinSplitV3) {
    w.write_u64(js.vpub_old);
    w.write_u64(js.vpub_new);
    w.write_bytes(&js.anchor);
    w.write_bytes(&js.nullifiers[0]);
    w.write_bytes(&js.nullifiers[1]);
    w.write_bytes(&js.commitments[0]);
    w.write_bytes(&js.commitments[1]);
    w.write_bytes(&js.ephemeral_key);
    w.write_bytes(&js.random_seed);
    w.write_bytes(&js.vmacs[0]);
    w.write_bytes(&js.vmacs[1]);
    w.write_bytes(&js.zkproof);
    w.write_bytes(&js.enc_ciphertexts[0]);
    w.write_bytes(&js.enc_ciphertexts[1]);
}

impl Transaction {
    pub fn deserialize(bytes: &[u8], network: Network) -> Result<Transaction> {
        let mut c = Cursor::new(bytes);
        let header = c.read_u32()?;
        let overwintered = header & OVERWINTERED_FLAG != 0;
        let version = header & !OVERWINTERED_FLAG;

        let version_group_id = if overwintered {
            let vgid = c.read_u32()?;
            let expected = match version {
                3 => params::OVERWINTER_VERSION_GROUP_ID,
                4 => params::SAPLING_VERSION_GROUP_ID,
                v => return Err(CoreError::TransactionVersionError(v)),
            };
            if vgid != expected {
                return Err(CoreError::TransactionVersionError(version));
            }
            vgid
        } else {
            0
        };

        let input_count = c.read_compact_size()?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(parse_input(&mut c, network)?);
        }

        let output_count = c.read_compact_size()?;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            outputs.push(parse_output(&mut c, network)?);
        }

        let lock_time = c.read_u32()?;

        let overwinter = if overwintered {
            let expiry_height = c.read_u32()?;
            let mut value_balance = None;
            let mut shielded_spends = Vec::new();
            let mut shielded_outputs = Vec::new();

            if version == 4 {
                value_balance = Some(c.read_i64()?);
                let spend_count = c.read_compact_size()? as usize;
                shielded_spends = c.read_bytes(spend_count * SHIELDED_SPEND_SIZE)?.to_vec();
                let output_count = c.read_compact_size()? as usize;
                shielded_outputs = c.read_bytes(output_count * SHIELDED_OUTPUT_SIZE)?.to_vec();
            }

            let join_split_count = c.read_compact_size()? as usize;
            let join_splits = if join_split_count == 0 {
                JoinSplits::None
            } else if version == 4 {
                let mut blobs = Vec::with_capacity(join_split_count);
                for _ in 0..join_split_count {
                    blobs.push(c.read_bytes(JOIN_SPLIT_V4_SIZE)?.to_vec());
                }
                JoinSplits::OpaqueV4(blobs)
            } else {
                let mut parsed = Vec::with_capacity(join_split_count);
                for _ in 0..join_split_count {
                    parsed.push(parse_join_split_v3(&mut c)?);
                }
                JoinSplits::ParsedV3(parsed)
            };

            let (join_split_pubkey, join_split_sig, binding_sig) = if join_split_count > 0 {
                let pubkey = c.read_array()?;
                let sig = c.read_array()?;
                let binding = if version == 4 {
                    Some(c.read_array()?)
                } else {
                    None
                };
                (Some(pubkey), Some(sig), binding)
            } else {
                (None, None, None)
            };

            Some(OverwinterFields {
                version_group_id,
                expiry_height,
                value_balance,
                shielded_spends,
                shielded_outputs,
                join_splits,
                join_split_pubkey,
                join_split_sig,
                binding_sig,
            })
        } else {
            None
        };

        Ok(Transaction {
            version,
            overwinter,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        let header = if self.overwinter.is_some() {
            self.version | OVERWINTERED_FLAG
        } else {
            self.version
        };
        w.write_u32(header);
        if let Some(ov) = &self.overwinter {
            w.write_u32(ov.version_group_id);
        }

        w.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            write_input(&mut w, input);
        }
        w.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            write_output(&mut w, output);
        }
        w.write_u32(self.lock_time);

        if let Some(ov) = &self.overwinter {
            w.write_u32(ov.expiry_height);
            if self.version == 4 {
                w.write_i64(ov.value_balance.unwrap_or(0));
                w.write_compact_size((ov.shielded_spends.len() / SHIELDED_SPEND_SIZE) as u64);
                w.write_bytes(&ov.shielded_spends);
                w.write_compact_size((ov.shielded_outputs.len() / SHIELDED_OUTPUT_SIZE) as u64);
                w.write_bytes(&ov.shielded_outputs);
            }
            w.write_compact_size(ov.join_splits.count() as u64);
            match &ov.join_splits {
                JoinSplits::None => {}
                JoinSplits::ParsedV3(list) => {
                    for js in list {
                        write_join_split_v3(&mut w, js);
                    }
                }
                JoinSplits::OpaqueV4(blobs) => {
                    for blob in blobs {
                        debug_assert_eq!(blob.len(), JOIN_SPLIT_V4_SIZE);
                        w.write_bytes(blob);
                    }
                }
            }
            if ov.join_splits.count() > 0 {
                if let Some(pk) = ov.join_split_pubkey {
                    w.write_bytes(&pk);
                }
                if let Some(sig) = ov.join_split_sig {
                    w.write_bytes(&sig);
                }
                if self.version == 4 {
                    if let Some(sig) = ov.binding_sig {
                        w.write_bytes(&sig);
                    }
                }
            }
        }
        w.into_vec()
    }

    /// `BIP_LI01_sort`: canonical ordering of inputs by `(prevout_hash,
    /// prevout_n)` and outputs by `(value, script)`, used only when a
    /// caller explicitly asks for deterministic transaction ordering.
    pub fn bip_li01_sort(&mut self) {
        self.inputs
            .sort_by(|a, b| (a.prevout_hash, a.prevout_n).cmp(&(b.prevout_hash, b.prevout_n)));
        self.outputs
            .sort_by(|a, b| (a.value, &a.script).cmp(&(b.value, &b.script)));
    }
}
