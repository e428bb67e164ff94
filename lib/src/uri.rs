//! Payment URI parsing: `zcash:<address>?k=v&k=v...`.
//!
//! Grounded on the `zcash:`-scheme payment URI convention shared across
//! the Electrum-family wallets (the same grammar as `bitcoin:` URIs, BIP-21),
//! generalized here to this chain's scheme name per spec.md §6. No
//! `original_source` file survived the distillation filter for this piece,
//! so the literal grammar in spec.md §6 and scenarios S1/S2 are the ground
//! truth for field names and error behavior.

use crate::address;
use crate::error::{CoreError, Result};
use std::collections::HashMap;

const SCHEME: &str = "zcash:";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentUri {
    pub address: String,
    pub amount: Option<i64>,
    pub label: Option<String>,
    pub message: Option<String>,
    /// Mirrors `message` per spec.md §6: both keys are populated whenever
    /// `message` is present.
    pub memo: Option<String>,
    pub r: Option<String>,
    pub other: HashMap<String, String>,
}

fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = s
                    .get(i + 1..i + 3)
                    .ok_or_else(|| CoreError::InvalidURI(format!("bad percent-escape in {}", s)))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| CoreError::InvalidURI(format!("bad percent-escape in {}", s)))?;
                out.push(byte);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| CoreError::InvalidURI(format!("invalid utf-8 in {}", s)))
}

/// Parses a decimal coin amount (e.g. `"0.0003"`) into satoshis, without
/// going through floating point.
fn parse_amount(s: &str) -> Result<i64> {
    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-');
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if frac.len() > 8 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidURI(format!("bad amount: {}", s)));
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| CoreError::InvalidURI(format!("bad amount: {}", s)))?
    };
    let mut frac_padded = frac.to_string();
    while frac_padded.len() < 8 {
        frac_padded.push('0');
    }
    let frac_sats: i64 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded
            .parse()
            .map_err(|_| CoreError::InvalidURI(format!("bad amount: {}", s)))?
    };
    let total = whole * 100_000_000 + frac_sats;
    Ok(if negative { -total } else { total })
}

/// Parses a `zcash:<address>?k=v&k=v...` URI. Duplicate query keys are
/// rejected with `DuplicateParameter`; a missing scheme prefix or an
/// address that fails Base58Check validation is `InvalidURI`.
pub fn parse(uri: &str) -> Result<PaymentUri> {
    if !uri.starts_with(SCHEME) {
        return Err(CoreError::InvalidURI(format!(
            "missing '{}' scheme: {}",
            SCHEME, uri
        )));
    }
    let rest = &uri[SCHEME.len()..];
    let (addr_part, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };
    let addr_part = percent_decode(addr_part)?;
    address::decode(&addr_part)
        .map_err(|_| CoreError::InvalidURI(format!("invalid address: {}", addr_part)))?;

    let mut result = PaymentUri {
        address: addr_part,
        ..Default::default()
    };
    let mut seen: HashMap<String, ()> = HashMap::new();

    if let Some(query) = query {
        if query.is_empty() {
            return Ok(result);
        }
        for pair in query.split('&') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CoreError::InvalidURI(format!("malformed query parameter: {}", pair)))?;
            let key = percent_decode(key)?;
            let value = percent_decode(value)?;
            if seen.insert(key.clone(), ()).is_some() {
                return Err(CoreError::DuplicateParameter(key));
            }
            match key.as_str() {
                "amount" => result.amount = Some(parse_amount(&value)?),
                "label" => result.label = Some(value),
                "message" => {
                    result.memo = Some(value.clone());
                    result.message = Some(value);
                }
                "r" => result.r = Some(value),
                other => {
                    result.other.insert(other.to_string(), value);
                }
            }
        }
    }
    Ok(result)
}
