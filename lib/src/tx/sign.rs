//! Deterministic ECDSA signing and scriptSig assembly.
//!
//! Grounded on the "sign each expected pubkey slot, self-verify before
//! storing" flow described for `bitcoinz_overwinter_builder.rs`, generalized
//! across legacy/overwintered digests and across p2pk/p2pkh/p2sh
//! assembly. Signing is pure and stateless: nothing here touches a
//! `ChainStore` or the filesystem, so callers may sign unrelated
//! transactions concurrently.

use crate::address;
use crate::error::{CoreError, Result};
use crate::params::Network;
use crate::tx::script::{self, push_script};
use crate::tx::sighash::{legacy_sighash, overwinter_sighash};
use crate::tx::{InputKind, Transaction, TxInput};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::collections::HashMap;

/// Placeholder byte pushed into a multisig scriptSig slot whose signature
/// hasn't been produced yet.
pub const NO_SIGNATURE: u8 = 0xff;

/// What a caller must supply to sign one input: the value (zatoshi) and
/// `scriptCode` of the coin being spent.
pub struct InputCoin {
    pub value: i64,
    pub script_code: Vec<u8>,
}

/// Signs every input of `tx` for which a secret key is available under
/// `keys`, keyed by the raw pubkey bytes referenced in `x_pubkeys`.
/// Inputs this wallet has no key for are left untouched. After signing,
/// each touched input's `signatures`/`script_sig` are updated in place.
pub fn sign_transaction(
    tx: &mut Transaction,
    coins: &[InputCoin],
    keys: &HashMap<Vec<u8>, SecretKey>,
    network: Network,
) -> Result<()> {
    let secp = Secp256k1::new();
    let overwintered = tx.is_overwintered();

    for i in 0..tx.inputs.len() {
        if tx.inputs[i].is_coinbase() {
            continue;
        }
        let coin = &coins[i];
        let x_pubkeys = tx.inputs[i].x_pubkeys.clone();
        for j in 0..x_pubkeys.len() {
            if tx.inputs[i]
                .signatures
                .get(j)
                .map(|s| s.is_some())
                .unwrap_or(true)
            {
                continue;
            }
            let secret = match keys.get(&x_pubkeys[j]) {
                Some(sk) => sk,
                None => continue,
            };

            let digest = if overwintered {
                overwinter_sighash(tx, i, &coin.script_code, coin.value, network)
            } else {
                legacy_sighash(tx, i, &coin.script_code)
            };
            let message = Message::from_slice(&digest)
                .map_err(|e| CoreError::SerializationError(e.to_string()))?;

            let mut signature = secp.sign(&message, secret);
            signature.normalize_s();

            let public = PublicKey::from_secret_key(&secp, secret);
            secp.verify(&message, &signature, &public)
                .map_err(|_| CoreError::SanityCheckFailed)?;

            let mut der = signature.serialize_der().to_vec();
            der.push(0x01); // SIGHASH_ALL

            tx.inputs[i].signatures[j] = Some(der);
        }
        let input = &mut tx.inputs[i];
        input.script_sig = assemble_input_script(
            &input.kind,
            &input.signatures,
            &input.pubkeys,
            input.num_sig,
        );
    }
    Ok(())
}

/// Builds the final `scriptSig` from an input's recognized kind and its
/// current signature slots.
pub fn assemble_input_script(
    kind: &InputKind,
    signatures: &[Option<Vec<u8>>],
    pubkeys: &[Vec<u8>],
    num_sig: u8,
) -> Vec<u8> {
    match kind {
        InputKind::P2pk => signatures
            .first()
            .and_then(|s| s.as_ref())
            .map(|sig| push_script(sig))
            .unwrap_or_default(),
        InputKind::P2pkh { pubkey } => {
            let mut out = signatures
                .first()
                .and_then(|s| s.as_ref())
                .map(|sig| push_script(sig))
                .unwrap_or_default();
            out.extend(push_script(pubkey));
            out
        }
        InputKind::P2sh { .. } => {
            let mut out = vec![script::OP_0];
            for sig in signatures {
                match sig {
                    Some(s) => out.extend(push_script(s)),
                    None => out.extend(push_script(&[NO_SIGNATURE])),
                }
            }
            let redeem = script::multisig_script(pubkeys, num_sig);
            out.extend(push_script(&redeem));
            out
        }
        InputKind::Coinbase | InputKind::Unknown => Vec::new(),
    }
}

/// Re-derives the scriptCode an input's signature is checked against from
/// its recognized kind, mirroring `get_preimage_script`: a p2pkh input signs
/// against its own pubkey-hash script, a p2sh input against its stored
/// redeem script (re-parsed for its multisig shape), a p2pk input against a
/// bare `<pubkey> OP_CHECKSIG`. Coinbase and unrecognized inputs have no
/// well-defined scriptCode to derive.
pub fn preimage_script_for_input(input: &TxInput) -> Result<Vec<u8>> {
    match &input.kind {
        InputKind::P2pkh { pubkey } => Ok(script::p2pkh_script(&address::hash160(pubkey))),
        InputKind::P2sh { redeem_script } => {
            let (m, pubkeys) = script::parse_redeem_script(redeem_script)?;
            Ok(script::multisig_script(&pubkeys, m))
        }
        InputKind::P2pk => {
            let pubkey = input
                .pubkeys
                .first()
                .ok_or(CoreError::UnknownTxinType)?;
            let mut out = push_script(pubkey);
            out.push(script::OP_CHECKSIG);
            Ok(out)
        }
        InputKind::Coinbase | InputKind::Unknown => Err(CoreError::UnknownTxinType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{OutputKind, OverwinterFields, TxInput, TxOutput};
    use secp256k1::rand::thread_rng;

    fn make_input(pubkey: Vec<u8>) -> TxInput {
        TxInput {
            prevout_hash: [2u8; 32],
            prevout_n: 0,
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
            kind: InputKind::P2pkh {
                pubkey: pubkey.clone(),
            },
            num_sig: 1,
            x_pubkeys: vec![pubkey.clone()],
            pubkeys: vec![pubkey],
            signatures: vec![None],
        }
    }

    #[test]
    fn signs_and_self_verifies_a_p2pkh_input() {
        let secp = Secp256k1::new();
        let mut rng = thread_rng();
        let (secret, public) = secp.generate_keypair(&mut rng);
        let pubkey_bytes = public.serialize().to_vec();

        let mut tx = Transaction {
            version: 4,
            overwinter: Some(OverwinterFields {
                version_group_id: crate::params::SAPLING_VERSION_GROUP_ID,
                expiry_height: 0,
                value_balance: Some(0),
                shielded_spends: Vec::new(),
                shielded_outputs: Vec::new(),
                join_splits: Default::default(),
                join_split_pubkey: None,
                join_split_sig: None,
                binding_sig: None,
            }),
            inputs: vec![make_input(pubkey_bytes.clone())],
            outputs: vec![TxOutput {
                value: 4_900_000_000,
                kind: OutputKind::Script(Vec::new()),
                script: vec![0x76, 0xa9],
            }],
            lock_time: 0,
        };

        let mut keys = HashMap::new();
        keys.insert(pubkey_bytes.clone(), secret);
        let coins = vec![InputCoin {
            value: 5_000_000_000,
            script_code: script::p2pkh_script(&crate::address::hash160(&pubkey_bytes)),
        }];

        sign_transaction(&mut tx, &coins, &keys, Network::Mainnet).unwrap();

        assert!(tx.inputs[0].signatures[0].is_some());
        assert!(tx.inputs[0].is_complete());
        assert!(!tx.inputs[0].script_sig.is_empty());
    }

    #[test]
    fn leaves_inputs_untouched_when_no_key_is_available() {
        let pubkey = vec![0x02; 33];
        let mut tx = Transaction {
            version: 1,
            overwinter: None,
            inputs: vec![make_input(pubkey)],
            outputs: vec![],
            lock_time: 0,
        };
        let coins = vec![InputCoin {
            value: 0,
            script_code: Vec::new(),
        }];
        sign_transaction(&mut tx, &coins, &HashMap::new(), Network::Mainnet).unwrap();
        assert!(tx.inputs[0].signatures[0].is_none());
    }

    #[test]
    fn preimage_script_derives_the_p2pkh_pubkey_hash_script() {
        let pubkey = vec![0x02; 33];
        let input = make_input(pubkey.clone());
        let expected = script::p2pkh_script(&crate::address::hash160(&pubkey));
        assert_eq!(preimage_script_for_input(&input).unwrap(), expected);
    }

    #[test]
    fn preimage_script_derives_the_p2sh_multisig_script_from_the_redeem_script() {
        let pubkeys = vec![vec![0x02; 33], vec![0x03; 33]];
        let redeem = script::multisig_script(&pubkeys, 2);
        let mut input = make_input(vec![0x02; 33]);
        input.kind = InputKind::P2sh {
            redeem_script: redeem,
        };
        assert_eq!(
            preimage_script_for_input(&input).unwrap(),
            script::multisig_script(&pubkeys, 2)
        );
    }

    #[test]
    fn preimage_script_rejects_a_malformed_redeem_script() {
        let mut input = make_input(vec![0x02; 33]);
        input.kind = InputKind::P2sh {
            redeem_script: vec![0x51, 0x52], // OP_1 OP_2, not a multisig shape
        };
        let err = preimage_script_for_input(&input).unwrap_err();
        assert!(matches!(err, CoreError::NotRecognizedRedeemScript));
    }

    #[test]
    fn preimage_script_rejects_unknown_and_coinbase_inputs() {
        let mut unknown = make_input(vec![0x02; 33]);
        unknown.kind = InputKind::Unknown;
        assert!(matches!(
            preimage_script_for_input(&unknown).unwrap_err(),
            CoreError::UnknownTxinType
        ));

        let mut coinbase = make_input(vec![0x02; 33]);
        coinbase.kind = InputKind::Coinbase;
        assert!(matches!(
            preimage_script_for_input(&coinbase).unwrap_err(),
            CoreError::UnknownTxinType
        ));
    }
}
