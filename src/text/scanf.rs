//! Scanf style input conversion
//!
//! The dual of [`printf`](super::printf): literal bytes in the spec
//! must match the input, whitespace in the spec matches any run of
//! whitespace (including none) and each `%` directive converts one
//! field using the numeric parsers. Scanning stops at the first
//! literal mismatch or at a conversion that consumes nothing; the
//! values converted up to that point are returned.

use std::fmt::{self, Display};

use super::numeric::{parse_float, parse_integer, parse_unsigned};
use super::printf::{parse_length, parse_width};
use super::string::{cstr, is_space, skip_space};

/// A converted field
#[derive(Debug, Clone, PartialEq)]
pub enum ScanValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    Str(Vec<u8>),
}

impl Display for ScanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanValue::Int(i) => write!(f, "{}", i),
            ScanValue::Uint(u) => write!(f, "{}", u),
            ScanValue::Float(x) => write!(f, "{}", x),
            ScanValue::Char(c) => write!(f, "{:?}", *c as char),
            ScanValue::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
        }
    }
}

/// Result of converting one field: the value and bytes consumed
type Field = Option<(ScanValue, usize)>;

fn signed_field(field: &[u8], base: u32) -> Field {
    parse_integer::<i64>(field, base)
        .ok()
        .filter(|p| p.converted())
        .map(|p| (ScanValue::Int(p.value), p.rest))
}

fn unsigned_field(field: &[u8], base: u32) -> Field {
    parse_unsigned::<u64>(field, base)
        .ok()
        .filter(|p| p.converted())
        .map(|p| (ScanValue::Uint(p.value), p.rest))
}

fn float_field(field: &[u8]) -> Field {
    let p = parse_float(field);
    if p.converted() {
        Some((ScanValue::Float(p.value), p.rest))
    } else {
        None
    }
}

fn string_field(field: &[u8]) -> Field {
    let len = field.iter().take_while(|c| !is_space(**c)).count();
    if len == 0 {
        None
    } else {
        Some((ScanValue::Str(field[..len].to_vec()), len))
    }
}

fn char_field(field: &[u8], width: usize) -> Field {
    match field.len() {
        n if n < width || n == 0 => None,
        1 => Some((ScanValue::Char(field[0]), 1)),
        n => Some((ScanValue::Str(field.to_vec()), n)),
    }
}

/// Convert fields of `text` as directed by `spec`
pub fn scan<T: AsRef<[u8]> + ?Sized, S: AsRef<[u8]> + ?Sized>(text: &T, spec: &S) -> Vec<ScanValue> {
    let text = cstr(text.as_ref());
    let mut spec = cstr(spec.as_ref());
    let mut pos = 0;
    let mut values = vec![];

    while let Some(&c) = spec.first() {
        if is_space(c) {
            spec = &spec[skip_space(spec)..];
            pos += skip_space(&text[pos..]);
            continue;
        }

        if c != b'%' {
            if text.get(pos) == Some(&c) {
                pos += 1;
                spec = &spec[1..];
                continue;
            }
            trace!("scan stopped at offset {}: expected {:?}", pos, c as char);
            break;
        }

        let mut sub = &spec[1..];
        let suppress = sub.first() == Some(&b'*');
        if suppress {
            sub = &sub[1..];
        }
        let (width, sub) = parse_width(sub);
        let (_, sub) = parse_length(sub);
        let conversion = match sub.first() {
            Some(&conversion) => conversion,
            None => break,
        };
        spec = &sub[1..];

        if conversion == b'%' {
            pos += skip_space(&text[pos..]);
            if text.get(pos) == Some(&b'%') {
                pos += 1;
                continue;
            }
            trace!("scan stopped at offset {}: expected '%'", pos);
            break;
        }

        if conversion != b'c' {
            pos += skip_space(&text[pos..]);
        }
        let width = match (width, conversion) {
            (0, b'c') => 1,
            (0, _) => usize::MAX,
            (w, _) => w,
        };
        let remaining = &text[pos..];
        let field = &remaining[..width.min(remaining.len())];

        let converted = match conversion {
            b'd' => signed_field(field, 10),
            b'i' => signed_field(field, 0),
            b'u' => unsigned_field(field, 10),
            b'o' => unsigned_field(field, 8),
            b'x' | b'X' => unsigned_field(field, 16),
            b'f' | b'F' | b'e' | b'E' | b'g' | b'G' => float_field(field),
            b's' => string_field(field),
            b'c' => char_field(field, width),
            other => {
                trace!("scan skipped unknown directive %{}", other as char);
                continue;
            }
        };

        match converted {
            Some((value, consumed)) => {
                pos += consumed;
                if !suppress {
                    values.push(value);
                }
            }
            None => {
                trace!(
                    "scan stopped at offset {}: %{} converted nothing",
                    pos,
                    conversion as char
                );
                break;
            }
        }
    }

    values
}
