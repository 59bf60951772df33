//! Text to number conversion
//!
//! `strtol`, `strtoul` and `strtod` style parsers. Each reports the
//! value, the byte offset just past the last character consumed and
//! whether the value saturated. Out of range integers clamp to the
//! bounds of the target type and stop consuming at the digit that
//! overflowed.

use thiserror::Error;

use super::string::skip_space;
use crate::common::errno::{EINVAL, ERANGE};

/// Largest decimal exponent applied by `parse_float`; beyond this
/// every finite mantissa has already reached zero or infinity
const MAX_EXPONENT: i32 = 1000;

/// Fractional digits stop contributing once their place value passes
/// this; the rest are consumed but ignored
const MAX_FRACTION_SCALE: f64 = 1e300;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("invalid base {0} (expected 0 or 2 to 36)")]
    InvalidBase(u32),
}

impl ConversionError {
    pub fn errno(&self) -> i32 {
        EINVAL
    }
}

/// Outcome of a conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parsed<T> {
    /// Converted value (saturated if `overflowed`)
    pub value: T,
    /// Offset of the first unconsumed byte; zero when nothing converted
    pub rest: usize,
    /// The value was out of range for the target type
    pub overflowed: bool,
}

impl<T> Parsed<T> {
    /// `ERANGE` for saturated results, else 0
    pub fn errno(&self) -> i32 {
        if self.overflowed {
            ERANGE
        } else {
            0
        }
    }

    /// True if any characters were consumed
    pub fn converted(&self) -> bool {
        self.rest > 0
    }
}

/// Signed integer targets
pub trait SignedTarget: Copy {
    const MIN: i128;
    const MAX: i128;
    fn from_i128(value: i128) -> Self;
}

/// Unsigned integer targets
pub trait UnsignedTarget: Copy {
    const MAX: u128;
    fn from_u128(value: u128) -> Self;
    fn wrapping_neg(self) -> Self;
}

macro_rules! signed_target {
    ($($t:ty),*) => {
        $(impl SignedTarget for $t {
            const MIN: i128 = <$t>::MIN as i128;
            const MAX: i128 = <$t>::MAX as i128;
            fn from_i128(value: i128) -> Self {
                value as $t
            }
        })*
    };
}

macro_rules! unsigned_target {
    ($($t:ty),*) => {
        $(impl UnsignedTarget for $t {
            const MAX: u128 = <$t>::MAX as u128;
            fn from_u128(value: u128) -> Self {
                value as $t
            }
            fn wrapping_neg(self) -> Self {
                <$t>::wrapping_neg(self)
            }
        })*
    };
}

signed_target!(i8, i16, i32, i64, isize);
unsigned_target!(u8, u16, u32, u64, usize);

/// Value of `c` as a digit in any base up to 36
pub fn digit_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'z' => Some((c - b'a') as u32 + 10),
        b'A'..=b'Z' => Some((c - b'A') as u32 + 10),
        _ => None,
    }
}

fn digit_in_base(c: Option<&u8>, base: u32) -> Option<u32> {
    c.and_then(|c| digit_value(*c)).filter(|d| *d < base)
}

/// Raw magnitude accumulated by [`scan_integer`]
#[derive(Debug)]
struct Magnitude {
    negative: bool,
    value: u128,
    rest: usize,
    overflowed: bool,
}

/// Shared strtol / strtoul front end
///
/// `limit` gives the largest magnitude representable for the sign
/// seen.
fn scan_integer(
    text: &[u8],
    base: u32,
    limit: impl Fn(bool) -> u128,
) -> Result<Magnitude, ConversionError> {
    if base == 1 || base > 36 {
        return Err(ConversionError::InvalidBase(base));
    }

    let mut i = skip_space(text);
    let mut negative = false;
    match text.get(i) {
        Some(b'-') => {
            negative = true;
            i += 1;
        }
        Some(b'+') => i += 1,
        _ => {}
    }

    let mut base = base;
    if (base == 0 || base == 16)
        && text.get(i) == Some(&b'0')
        && matches!(text.get(i + 1), Some(b'x') | Some(b'X'))
        && digit_in_base(text.get(i + 2), 16).is_some()
    {
        base = 16;
        i += 2;
    }
    if base == 0 {
        base = if text.get(i) == Some(&b'0') { 8 } else { 10 };
    }

    let limit = limit(negative);
    let start = i;
    let mut value: u128 = 0;
    let mut overflowed = false;
    while let Some(d) = digit_in_base(text.get(i), base) {
        let d = d as u128;
        if value > (limit - d.min(limit)) / base as u128 || d > limit {
            value = limit;
            overflowed = true;
            break;
        }
        value = value * base as u128 + d;
        i += 1;
    }

    if i == start && !overflowed {
        return Ok(Magnitude {
            negative: false,
            value: 0,
            rest: 0,
            overflowed: false,
        });
    }

    Ok(Magnitude {
        negative,
        value,
        rest: i,
        overflowed,
    })
}

/// strtol: parse a signed integer in `base` (0 to auto-detect)
pub fn parse_integer<T: SignedTarget>(
    text: &[u8],
    base: u32,
) -> Result<Parsed<T>, ConversionError> {
    let magnitude = scan_integer(text, base, |negative| {
        if negative {
            T::MIN.unsigned_abs()
        } else {
            T::MAX as u128
        }
    })?;
    let value = if magnitude.negative {
        // the magnitude of MIN is one beyond MAX so negate in i128
        -(magnitude.value as i128)
    } else {
        magnitude.value as i128
    };
    Ok(Parsed {
        value: T::from_i128(value),
        rest: magnitude.rest,
        overflowed: magnitude.overflowed,
    })
}

/// strtoul: parse an unsigned integer; a leading `-` negates modulo
/// the width of `T`
pub fn parse_unsigned<T: UnsignedTarget>(
    text: &[u8],
    base: u32,
) -> Result<Parsed<T>, ConversionError> {
    let magnitude = scan_integer(text, base, |_| T::MAX)?;
    let value = T::from_u128(magnitude.value);
    let value = if magnitude.negative && !magnitude.overflowed {
        value.wrapping_neg()
    } else {
        value
    };
    Ok(Parsed {
        value,
        rest: magnitude.rest,
        overflowed: magnitude.overflowed,
    })
}

/// strtod: sign, integer part, fraction and exponent, scaled by
/// repeated multiplication rather than a power function
pub fn parse_float(text: &[u8]) -> Parsed<f64> {
    let mut i = skip_space(text);
    let mut negative = false;
    match text.get(i) {
        Some(b'-') => {
            negative = true;
            i += 1;
        }
        Some(b'+') => i += 1,
        _ => {}
    }

    let mut digits = 0;
    let mut value = 0.0f64;
    while let Some(d) = digit_in_base(text.get(i), 10) {
        value = value * 10.0 + d as f64;
        digits += 1;
        i += 1;
    }

    if text.get(i) == Some(&b'.') {
        let mut j = i + 1;
        let mut fraction = 0.0f64;
        let mut scale = 1.0f64;
        while let Some(d) = digit_in_base(text.get(j), 10) {
            if scale < MAX_FRACTION_SCALE {
                fraction = fraction * 10.0 + d as f64;
                scale *= 10.0;
            }
            digits += 1;
            j += 1;
        }
        if digits > 0 {
            value += fraction / scale;
            i = j;
        }
    }

    if digits == 0 {
        return Parsed {
            value: 0.0,
            rest: 0,
            overflowed: false,
        };
    }

    if matches!(text.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        let mut exponent_negative = false;
        match text.get(j) {
            Some(b'-') => {
                exponent_negative = true;
                j += 1;
            }
            Some(b'+') => j += 1,
            _ => {}
        }
        if digit_in_base(text.get(j), 10).is_some() {
            let mut exponent: i32 = 0;
            while let Some(d) = digit_in_base(text.get(j), 10) {
                exponent = (exponent * 10 + d as i32).min(MAX_EXPONENT);
                j += 1;
            }
            value = scale_by_ten(value, if exponent_negative { -exponent } else { exponent });
            i = j;
        }
    }

    Parsed {
        value: if negative { -value } else { value },
        rest: i,
        overflowed: value.is_infinite(),
    }
}

/// Multiply or divide by ten `exponent.abs()` times
pub fn scale_by_ten(mut value: f64, exponent: i32) -> f64 {
    for _ in 0..exponent.unsigned_abs() {
        if value == 0.0 || value.is_infinite() {
            break;
        }
        if exponent < 0 {
            value /= 10.0;
        } else {
            value *= 10.0;
        }
    }
    value
}

/// Decimal `int`, zero if nothing converts
pub fn atoi(text: &[u8]) -> i32 {
    parse_integer::<i32>(text, 10).map_or(0, |p| p.value)
}

/// Decimal `long`, zero if nothing converts
pub fn atol(text: &[u8]) -> i64 {
    parse_integer::<i64>(text, 10).map_or(0, |p| p.value)
}

pub fn atof(text: &[u8]) -> f64 {
    parse_float(text).value
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn long(text: &str, base: u32) -> (i64, usize, bool) {
        let p = parse_integer::<i64>(text.as_bytes(), base).unwrap();
        (p.value, p.rest, p.overflowed)
    }

    #[test]
    pub fn test_decimal() {
        assert_eq!(long("42", 10), (42, 2, false));
        assert_eq!(long("  -17xyz", 10), (-17, 5, false));
        assert_eq!(long("+5", 0), (5, 2, false));
        assert_eq!(long("abc", 10), (0, 0, false));
        assert_eq!(long("   ", 10), (0, 0, false));
        assert_eq!(long("-", 10), (0, 0, false));
    }

    #[test]
    pub fn test_base_detection() {
        assert_eq!(long("0x1A", 0), (26, 4, false));
        assert_eq!(long("0X1a", 16), (26, 4, false));
        assert_eq!(long("1a", 16), (26, 2, false));
        assert_eq!(long("017", 0), (15, 3, false));
        assert_eq!(long("0", 0), (0, 1, false));
        assert_eq!(long("0x", 0), (0, 1, false));
        assert_eq!(long("0xg", 16), (0, 1, false));
        assert_eq!(long("zz", 36), (36 * 36 - 1, 2, false));
        assert_eq!(long("1012", 2), (5, 3, false));
    }

    #[test]
    pub fn test_invalid_base() {
        assert_eq!(
            parse_integer::<i64>(b"1", 1),
            Err(ConversionError::InvalidBase(1))
        );
        assert_eq!(
            parse_unsigned::<u64>(b"1", 37),
            Err(ConversionError::InvalidBase(37))
        );
    }

    #[test]
    pub fn test_saturation() {
        let p = parse_integer::<i32>(b"99999999999999999999", 10).unwrap();
        assert_eq!(p.value, i32::MAX);
        assert!(p.overflowed);
        assert_eq!(p.errno(), ERANGE);
        assert_eq!(p.rest, 9, "stops at the digit that overflowed");

        let p = parse_integer::<i32>(b"-99999999999", 10).unwrap();
        assert_eq!(p.value, i32::MIN);
        assert!(p.overflowed);

        let p = parse_integer::<i64>(b"-9223372036854775808", 10).unwrap();
        assert_eq!(p.value, i64::MIN);
        assert!(!p.overflowed);

        let p = parse_integer::<i8>(b"128", 10).unwrap();
        assert_eq!((p.value, p.overflowed), (i8::MAX, true));
    }

    #[test]
    pub fn test_unsigned() {
        let p = parse_unsigned::<u32>(b"4294967295", 10).unwrap();
        assert_eq!((p.value, p.overflowed), (u32::MAX, false));
        let p = parse_unsigned::<u32>(b"4294967296", 10).unwrap();
        assert_eq!((p.value, p.overflowed), (u32::MAX, true));
        let p = parse_unsigned::<u32>(b"-1", 10).unwrap();
        assert_eq!(p.value, u32::MAX);
        let p = parse_unsigned::<u64>(b"0xff", 0).unwrap();
        assert_eq!((p.value, p.rest), (255, 4));
    }

    #[test]
    pub fn test_float() {
        let p = parse_float(b"3.25rest");
        assert_eq!((p.value, p.rest), (3.25, 4));
        let p = parse_float(b"  -1.5e2");
        assert_eq!((p.value, p.rest), (-150.0, 8));
        let p = parse_float(b"2E-2");
        assert!((p.value - 0.02).abs() < 1e-12);
        let p = parse_float(b".5");
        assert_eq!((p.value, p.rest), (0.5, 2));
        let p = parse_float(b"7.");
        assert_eq!((p.value, p.rest), (7.0, 2));
        let p = parse_float(b"1e");
        assert_eq!((p.value, p.rest), (1.0, 1));
        let p = parse_float(b"1e+x");
        assert_eq!((p.value, p.rest), (1.0, 1));
        let p = parse_float(b".");
        assert_eq!((p.value, p.rest), (0.0, 0));
        let p = parse_float(b"inf");
        assert_eq!((p.value, p.rest), (0.0, 0));
    }

    #[test]
    pub fn test_float_extremes() {
        let p = parse_float(b"1e999999");
        assert!(p.value.is_infinite());
        assert!(p.overflowed);
        assert_eq!(p.rest, 8);
        let p = parse_float(b"1e-999999");
        assert_eq!(p.value, 0.0);
        assert!(!p.overflowed);
    }

    #[test]
    pub fn test_long_fraction() {
        let text = format!("0.{}", "1".repeat(400));
        let p = parse_float(text.as_bytes());
        assert_eq!(p.rest, 402);
        assert!(!p.overflowed);
        assert!((p.value - 1.0 / 9.0).abs() < 1e-12, "{}", p.value);

        let text = format!("2.{}5e1", "0".repeat(350));
        let p = parse_float(text.as_bytes());
        assert_eq!(p.rest, text.len());
        assert_eq!(p.value, 20.0);
    }

    #[test]
    pub fn test_wrappers() {
        assert_eq!(atoi(b" 12abc"), 12);
        assert_eq!(atoi(b"junk"), 0);
        assert_eq!(atol(b"-9000000000"), -9_000_000_000);
        assert_eq!(atof(b"0.125"), 0.125);
    }
}
