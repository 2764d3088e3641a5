//! Conversion between raw integer token amounts and decimal strings.

use alloy_primitives::U256;

use crate::error::EthError;

/// `2^256 - 1`, the value sent for an "infinite" approval.
pub const MAX_UINT256: U256 = U256::MAX;

/// Allowances at or above `2^255` are treated as unlimited for display.
pub fn is_unlimited_allowance(amount: U256) -> bool {
    amount.bit(255)
}

/// `10^decimals`, `None` above `10^77`.
fn pow10(decimals: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// Renders `raw / 10^decimals` as a decimal string.
///
/// When `display_decimals` is set, fractional digits beyond it are truncated.
/// Trailing zero digits are trimmed; zero renders as `"0"`.
pub fn format_amount(raw: U256, decimals: u8, display_decimals: Option<u8>) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    // Past 10^77 every uint256 is a pure fraction.
    let (whole, frac) = match pow10(decimals) {
        Some(unit) => (raw / unit, raw % unit),
        None => (U256::ZERO, raw),
    };

    let mut frac_digits = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    if let Some(shown) = display_decimals {
        frac_digits.truncate(shown as usize);
    }
    let frac_digits = frac_digits.trim_end_matches('0');

    if frac_digits.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac_digits}")
    }
}

/// Parses a decimal string into a raw amount with `decimals` precision.
///
/// Fractional digits beyond `decimals` are truncated, not rounded. Signs,
/// exponents, separators and other non-digit characters are rejected.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, EthError> {
    let input = input.trim();
    let invalid = || EthError::InvalidArgument(format!("not a valid amount: {input:?}"));
    let unit = pow10(decimals)
        .ok_or_else(|| EthError::InvalidArgument(format!("unsupported token decimals: {decimals}")))?;

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let frac = &frac[..frac.len().min(decimals as usize)];
    let whole_value = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| invalid())?
    };
    let frac_value = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| invalid())?
    };

    whole_value
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| EthError::InvalidArgument(format!("amount overflows uint256: {input}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn format_whole_and_fraction() {
        assert_eq!(format_amount(u(1_500_000), 6, None), "1.5");
        assert_eq!(format_amount(u(1_000_000_000_000_000_000), 18, None), "1");
        assert_eq!(format_amount(u(1), 18, None), "0.000000000000000001");
    }

    #[test]
    fn format_zero_is_zero() {
        assert_eq!(format_amount(U256::ZERO, 18, None), "0");
        assert_eq!(format_amount(U256::ZERO, 18, Some(4)), "0");
    }

    #[test]
    fn format_truncates_to_display_decimals() {
        // 1.23456789 with 8 decimals
        assert_eq!(format_amount(u(123_456_789), 8, Some(4)), "1.2345");
        assert_eq!(format_amount(u(123_456_789), 8, Some(0)), "1");
        // Below display precision collapses to the whole part.
        assert_eq!(format_amount(u(1), 18, Some(6)), "0");
    }

    #[test]
    fn format_zero_decimals() {
        assert_eq!(format_amount(u(42), 0, None), "42");
    }

    #[test]
    fn format_max_uint() {
        let s = format_amount(MAX_UINT256, 18, None);
        assert!(s.starts_with("115792089237316195423570985008687907853269984665640564039457"));
    }

    #[test]
    fn parse_basic() {
        assert_eq!(parse_amount("1.5", 6).unwrap(), u(1_500_000));
        assert_eq!(parse_amount("100", 6).unwrap(), u(100_000_000));
        assert_eq!(parse_amount(".5", 1).unwrap(), u(5));
        assert_eq!(parse_amount("2.", 2).unwrap(), u(200));
        assert_eq!(parse_amount(" 0.01 ", 2).unwrap(), u(1));
    }

    #[test]
    fn parse_truncates_excess_precision() {
        assert_eq!(parse_amount("1.2345678", 4).unwrap(), u(12_345));
        assert_eq!(parse_amount("0.999", 0).unwrap(), U256::ZERO);
    }

    #[test]
    fn parse_rejects_non_numeric() {
        for bad in ["", ".", "abc", "1.2.3", "-1", "+1", "1e18", "1,000", "0x10"] {
            assert!(
                matches!(parse_amount(bad, 18), Err(EthError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        let huge = "1".repeat(80);
        assert!(parse_amount(&huge, 18).is_err());
    }

    #[test]
    fn decimals_beyond_uint256_range() {
        let tiny = format!("0.{}1", "0".repeat(77));
        assert_eq!(format_amount(u(1), 78, None), tiny);
        assert_eq!(format_amount(MAX_UINT256, 255, Some(4)), "0");
        assert_eq!(format_amount(u(5), 77, None), format!("0.{}5", "0".repeat(76)));

        for decimals in [78, 100, 255] {
            assert!(
                matches!(parse_amount("1", decimals), Err(EthError::InvalidArgument(_))),
                "{decimals} decimals should be rejected"
            );
        }
        assert_eq!(parse_amount("1", 77).unwrap(), U256::from(10u64).pow(U256::from(77u64)));
    }

    #[test]
    fn format_then_parse_round_trips_at_full_precision() {
        for raw in [u(0), u(1), u(123_456_789_012_345_678), u(10u64.pow(18) * 7 + 5)] {
            let text = format_amount(raw, 18, Some(18));
            assert_eq!(parse_amount(&text, 18).unwrap(), raw, "{text}");
        }
    }

    #[test]
    fn lossy_display_does_not_round_trip() {
        let raw = u(123_456_789);
        let text = format_amount(raw, 8, Some(2));
        assert_ne!(parse_amount(&text, 8).unwrap(), raw);
    }

    #[test]
    fn unlimited_allowance_threshold() {
        assert!(is_unlimited_allowance(MAX_UINT256));
        assert!(is_unlimited_allowance(U256::from(1u64) << 255));
        assert!(!is_unlimited_allowance((U256::from(1u64) << 255) - U256::from(1u64)));
        assert!(!is_unlimited_allowance(u(1_000_000)));
    }
}
