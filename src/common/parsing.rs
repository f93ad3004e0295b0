// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

/// Convert a human decimal string ("12.5") into integer base units.
///
/// Rejects negative values, exponents and more fractional digits than `decimals`.
pub fn parse_decimal_units(raw: &str, decimals: u8) -> Result<u64, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty amount".to_string());
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err("empty amount".to_string());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{s}' is not a plain decimal"));
    }
    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(format!("more than {decimals} fractional digits"));
    }

    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or_else(|| format!("decimals {decimals} out of range"))?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|e| format!("whole part: {e}"))?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded
            .parse::<u64>()
            .map_err(|e| format!("fractional part: {e}"))?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| "amount overflows u64".to_string())
}

/// Render integer base units as a trimmed decimal string.
pub fn format_decimal_units(units: u64, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let (whole, frac) = match 10u128.checked_pow(decimals as u32) {
        Some(scale) => (units as u128 / scale, units as u128 % scale),
        // Beyond 10^38 every u64 is a pure fraction.
        None => (0, units as u128),
    };
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{frac:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac_str.trim_end_matches('0'))
}
