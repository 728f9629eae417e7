//! US Treasury price notation.
//!
//! Bond prices quote in 32nds with an extra eighth-of-a-32nd digit:
//!
//! ```text
//! 100-25+   = 100 + 25/32 + 4/256 = 100.78125
//! 99-312    =  99 + 31/32 + 2/256 =  99.97656250
//! ```
//!
//! The last character is `0..=7` or `+` (which means 4). Every reader in the
//! mesh also accepts plain decimals.

use crate::error::{MeshError, Result};

/// Ticks per point at the finest granularity (1/256).
const TICKS_PER_POINT: i64 = 256;

/// Parse either a plain decimal or a `WHOLE-XYz` fractional price.
pub fn parse_price(s: &str) -> Result<f64> {
    let s = s.trim();
    let Some((whole, frac)) = s.split_once('-') else {
        return parse_decimal(s);
    };

    let bad = || MeshError::Parse(format!("bad fractional price '{s}'"));

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let whole: i64 = whole.parse().map_err(|_| bad())?;

    let frac = frac.as_bytes();
    if frac.len() != 3 || !frac[0].is_ascii_digit() || !frac[1].is_ascii_digit() {
        return Err(bad());
    }
    let thirty_seconds = i64::from(frac[0] - b'0') * 10 + i64::from(frac[1] - b'0');
    if thirty_seconds > 31 {
        return Err(bad());
    }
    let eighths = match frac[2] {
        b'+' => 4,
        d @ b'0'..=b'7' => i64::from(d - b'0'),
        _ => return Err(bad()),
    };

    Ok(whole as f64 + (thirty_seconds * 8 + eighths) as f64 / TICKS_PER_POINT as f64)
}

/// Parse a plain decimal number (no fractional notation).
pub fn parse_decimal(s: &str) -> Result<f64> {
    let s = s.trim();
    match fast_float2::parse::<f64, _>(s) {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(MeshError::Parse(format!("bad number '{s}'"))),
    }
}

/// Format a price as `WHOLE-XYz`, rounding to the nearest 1/256.
///
/// A fraction that rounds up to 256/256 carries into the whole part, so
/// `99.999` formats as `100-000`.
pub fn format_fractional(price: f64) -> String {
    let ticks = (price * TICKS_PER_POINT as f64).round() as i64;
    let whole = ticks.div_euclid(TICKS_PER_POINT);
    let rem = ticks.rem_euclid(TICKS_PER_POINT);
    let thirty_seconds = rem / 8;
    let eighths = rem % 8;

    let last = if eighths == 4 { '+' } else { char::from(b'0' + eighths as u8) };
    format!("{whole}-{thirty_seconds:02}{last}")
}
