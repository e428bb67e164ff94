//! Satoshi-to-decimal-coin formatting.
//!
//! Grounded on the Electrum-family `format_satoshis` helper referenced (but
//! not included) by `original_source`'s import of `bitcoin.py`; its
//! behavior is pinned here by spec.md §8 scenario S3 instead.

/// Formats `amount` (in satoshis) as a fixed 8-decimal coin amount, e.g.
/// `1234 -> "0.00001234"`. When `diff` is set, a negative amount is shown
/// with a leading `-` exactly as it would be without `diff`; `diff` exists
/// so callers rendering balance deltas can request the sign explicitly
/// without special-casing zero/positive amounts themselves.
pub fn format_satoshis(amount: i64, diff: bool) -> String {
    let sign = if amount < 0 {
        "-"
    } else if diff {
        "+"
    } else {
        ""
    };
    let abs = amount.unsigned_abs();
    let whole = abs / 100_000_000;
    let frac = abs % 100_000_000;
    format!("{}{}.{:08}", sign, whole, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_small_positive_amount() {
        assert_eq!(format_satoshis(1234, false), "0.00001234");
    }

    #[test]
    fn formats_negative_amount_with_diff_flag() {
        assert_eq!(format_satoshis(-1234, true), "-0.00001234");
    }

    #[test]
    fn formats_whole_coins() {
        assert_eq!(format_satoshis(250_000_000, false), "2.50000000");
    }

    #[test]
    fn diff_adds_a_plus_sign_to_positive_amounts() {
        assert_eq!(format_satoshis(1234, true), "+0.00001234");
    }
}
