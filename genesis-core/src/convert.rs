//! Wallet-address and money formatting helpers

use rust_decimal::Decimal;

use crate::constants::MONEY_DIGITS;

/// Formats a wallet id as the grouped address form
/// `XXXX-XXXX-XXXX-XXXX-XXXX` (the i64 reinterpreted as u64, zero-padded
/// to 20 digits).
pub fn address_to_string(id: i64) -> String {
    let raw = format!("{:020}", id as u64);
    raw.as_bytes()
        .chunks(4)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}

/// Parses a wallet address: either a plain (possibly negative) integer or
/// the grouped `XXXX-XXXX-...` form. Returns 0 when the input has no
/// address reading, which callers treat as invalid.
pub fn string_to_address(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }
    if s.contains('-') && !s.starts_with('-') {
        let digits: String = s.split('-').collect();
        if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return 0;
        }
        return digits.parse::<u64>().map(|v| v as i64).unwrap_or(0);
    }
    s.parse::<i64>().unwrap_or(0)
}

/// Converts a raw balance string (integer scaled by 10^18) into the
/// human money form with the decimal point restored and trailing zeros
/// trimmed.
pub fn money_display(amount: &str) -> String {
    let negative = amount.starts_with('-');
    let digits = amount.trim_start_matches('-');
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return "0".to_string();
    }
    let scale = MONEY_DIGITS as usize;
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let split = padded.len() - scale;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Scales a human money amount to the raw integer representation.
pub fn money_raw(amount: &Decimal) -> String {
    let scaled = amount * Decimal::from(10u64.pow(MONEY_DIGITS));
    scaled.trunc().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn address_round_trip() {
        let id: i64 = -1744264011260937456;
        let s = address_to_string(id);
        assert_eq!(s.split('-').count(), 5);
        assert_eq!(string_to_address(&s), id);
    }

    #[test]
    fn plain_number_addresses() {
        assert_eq!(string_to_address("-1744264011260937456"), -1744264011260937456);
        assert_eq!(string_to_address("12345"), 12345);
        assert_eq!(string_to_address("not-an-address"), 0);
        assert_eq!(string_to_address(""), 0);
    }

    #[test]
    fn money_display_restores_point() {
        assert_eq!(money_display("1000000000000000000"), "1");
        assert_eq!(money_display("1500000000000000000"), "1.5");
        assert_eq!(money_display("123"), "0.000000000000000123");
        assert_eq!(money_display("0"), "0");
        assert_eq!(money_display("-2000000000000000000"), "-2");
    }

    #[test]
    fn money_raw_scales() {
        let d = Decimal::from_str("1.5").unwrap();
        assert_eq!(money_raw(&d), "1500000000000000000");
    }
}
