//! Token amount parsing and decimal formatting.

use alloy_primitives::U256;

/// USDT (TRC-20) uses 6 decimals.
pub const DEFAULT_DECIMALS: u32 = 6;

/// Parse a `constant_result` word (base-16, no `0x` prefix required).
///
/// Surrounding whitespace is ignored and an empty string is read as zero.
pub fn parse_hex_amount(raw: &str) -> Option<U256> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Render `value` scaled down by `10^decimals`.
///
/// Trailing zero digits of the fraction are trimmed; a zero fraction is
/// omitted entirely, so `1_500_000` with 6 decimals is `"1.5"` and
/// `2_000_000` is `"2"`.
pub fn format_units(value: U256, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let ten = U256::from(10u64);
    let scale = (0..decimals).fold(U256::from(1u64), |acc, _| acc * ten);
    let int_part = value / scale;
    let frac_part = value % scale;

    let frac = format!("{:0>width$}", frac_part.to_string(), width = decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac}")
    }
}
