//! Number to text building blocks
//!
//! Shared by the formatter and the calendar routines. Digits are
//! generated least significant first into the output buffer and the
//! run is then reversed in place.

const LOWER_DIGITS: &[u8; 16] = b"0123456789abcdef";
const UPPER_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Largest float whose integer part converts exactly through `u64`
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Append the digits of `value` in `base` (2 to 16)
pub fn unsigned_to_text(out: &mut Vec<u8>, mut value: u64, base: u32, upper: bool) -> usize {
    let digits = if upper { UPPER_DIGITS } else { LOWER_DIGITS };
    let base = base.clamp(2, 16) as u64;
    let start = out.len();
    loop {
        out.push(digits[(value % base) as usize]);
        value /= base;
        if value == 0 {
            break;
        }
    }
    out[start..].reverse();
    out.len() - start
}

/// Append `value` in `base`, with a leading `-` when negative
pub fn integer_to_text(out: &mut Vec<u8>, value: i64, base: u32) -> usize {
    let start = out.len();
    if value < 0 {
        out.push(b'-');
    }
    unsigned_to_text(out, value.unsigned_abs(), base, false);
    out.len() - start
}

/// Append the integer part of a non-negative finite float
fn integer_part_to_text(out: &mut Vec<u8>, value: f64) {
    if value < U64_LIMIT {
        unsigned_to_text(out, value as u64, 10, false);
        return;
    }
    let start = out.len();
    let mut value = value;
    while value >= 1.0 {
        let digit = (value % 10.0) as usize;
        out.push(LOWER_DIGITS[digit.min(9)]);
        value = (value / 10.0).trunc();
    }
    out[start..].reverse();
}

fn non_finite(out: &mut Vec<u8>, value: f64, upper: bool) -> bool {
    let text: &[u8] = if value.is_nan() {
        b"nan"
    } else if value == f64::INFINITY {
        b"inf"
    } else if value == f64::NEG_INFINITY {
        b"-inf"
    } else {
        return false;
    };
    if upper {
        out.extend(text.iter().map(u8::to_ascii_uppercase));
    } else {
        out.extend_from_slice(text);
    }
    true
}

/// Append `value` with exactly `precision` fractional digits
///
/// Fractional digits are peeled off by repeated multiplication and
/// truncated, never rounded.
pub fn float_to_text(out: &mut Vec<u8>, value: f64, precision: usize) -> usize {
    let start = out.len();
    if non_finite(out, value, false) {
        return out.len() - start;
    }

    let negative = value.is_sign_negative() && value != 0.0;
    let magnitude = value.abs();
    if negative {
        out.push(b'-');
    }

    let whole = magnitude.trunc();
    integer_part_to_text(out, whole);

    if precision > 0 {
        out.push(b'.');
        let mut fraction = magnitude - whole;
        for _ in 0..precision {
            fraction *= 10.0;
            let digit = (fraction as u8).min(9);
            out.push(b'0' + digit);
            fraction -= digit as f64;
        }
    }
    out.len() - start
}

/// Append `value` as `d.ddddde+XX`
///
/// The mantissa is normalised into [1, 10) by repeated scaling and
/// then rendered with [`float_to_text`]. The exponent has at least two
/// digits.
pub fn scientific_to_text(out: &mut Vec<u8>, value: f64, precision: usize, upper: bool) -> usize {
    let start = out.len();
    if non_finite(out, value, upper) {
        return out.len() - start;
    }

    let mut mantissa = value.abs();
    let mut exponent: i64 = 0;
    if mantissa != 0.0 {
        while mantissa >= 10.0 {
            mantissa /= 10.0;
            exponent += 1;
        }
        while mantissa < 1.0 {
            mantissa *= 10.0;
            exponent -= 1;
        }
    }

    if value.is_sign_negative() && value != 0.0 {
        out.push(b'-');
    }
    float_to_text(out, mantissa, precision);
    out.push(if upper { b'E' } else { b'e' });
    out.push(if exponent < 0 { b'-' } else { b'+' });
    if exponent.abs() < 10 {
        out.push(b'0');
    }
    unsigned_to_text(out, exponent.unsigned_abs(), 10, false);
    out.len() - start
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> usize) -> String {
        let mut out = b"prefix:".to_vec();
        let n = f(&mut out);
        assert_eq!(n, out.len() - 7);
        String::from_utf8(out[7..].to_vec()).unwrap()
    }

    #[test]
    pub fn test_integers() {
        assert_eq!(render(|o| integer_to_text(o, 0, 10)), "0");
        assert_eq!(render(|o| integer_to_text(o, -1234, 10)), "-1234");
        assert_eq!(render(|o| integer_to_text(o, i64::MIN, 10)), "-9223372036854775808");
        assert_eq!(render(|o| unsigned_to_text(o, 255, 16, false)), "ff");
        assert_eq!(render(|o| unsigned_to_text(o, 255, 16, true)), "FF");
        assert_eq!(render(|o| unsigned_to_text(o, 8, 8, false)), "10");
        assert_eq!(render(|o| unsigned_to_text(o, 5, 2, false)), "101");
        assert_eq!(render(|o| unsigned_to_text(o, u64::MAX, 10, false)), "18446744073709551615");
    }

    #[test]
    pub fn test_fixed() {
        assert_eq!(render(|o| float_to_text(o, 3.5, 6)), "3.500000");
        assert_eq!(render(|o| float_to_text(o, -0.25, 2)), "-0.25");
        assert_eq!(render(|o| float_to_text(o, 42.0, 0)), "42");
        assert_eq!(render(|o| float_to_text(o, 0.0, 1)), "0.0");
        assert_eq!(render(|o| float_to_text(o, -0.0, 1)), "0.0");
        assert_eq!(render(|o| float_to_text(o, 1e20, 0)), "100000000000000000000");
    }

    #[test]
    pub fn test_fixed_truncates() {
        assert_eq!(render(|o| float_to_text(o, 2.999, 2)), "2.99");
        assert_eq!(render(|o| float_to_text(o, 0.0625, 3)), "0.062");
    }

    #[test]
    pub fn test_non_finite() {
        assert_eq!(render(|o| float_to_text(o, f64::INFINITY, 6)), "inf");
        assert_eq!(render(|o| float_to_text(o, f64::NEG_INFINITY, 6)), "-inf");
        assert_eq!(render(|o| float_to_text(o, f64::NAN, 6)), "nan");
        assert_eq!(render(|o| scientific_to_text(o, f64::NAN, 6, true)), "NAN");
    }

    #[test]
    pub fn test_scientific() {
        assert_eq!(render(|o| scientific_to_text(o, 1234.5, 3, false)), "1.234e+03");
        assert_eq!(render(|o| scientific_to_text(o, -0.5, 1, true)), "-5.0E-01");
        assert_eq!(render(|o| scientific_to_text(o, 0.0, 2, false)), "0.00e+00");
        assert_eq!(render(|o| scientific_to_text(o, 1e10, 0, false)), "1e+10");
    }
}
