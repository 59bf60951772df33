//! Printf style %-formats
//!
//! Arguments are supplied as a slice of tagged [`Arg`] values rather
//! than a variadic list, so a missing or ill-typed argument is a
//! [`FormatError`] instead of undefined behaviour.
//!
//! Directives `d i u o x X c s f F e E g G p %` are supported,
//! together with the flags `- + space 0 # '`, a decimal width, a
//! `.precision` and the length modifiers `hh h l ll z t`. Dynamic
//! `*` widths are not supported, and widths or precisions above
//! [`MAX_FIELD`] are refused. Anything else after a `%` is copied
//! through as literal text.
//!
//! Floats are rendered approximately: digits are truncated rather
//! than rounded and `%g` is an alias for `%f`.

use bitflags::bitflags;
use thiserror::Error;

use super::convert::{float_to_text, scientific_to_text, unsigned_to_text};
use super::string::{cstr, memcpy};
use crate::common::errno::{EINVAL, EOVERFLOW};

/// Default number of fractional digits for floats
const DEFAULT_PRECISION: usize = 6;

/// Largest width or precision a directive may ask for
pub const MAX_FIELD: usize = 1 << 16;

bitflags! {
    /// Flags field.
    ///
    /// Definitions from
    /// [Wikipedia](https://en.wikipedia.org/wiki/Printf_format_string#Flags_field).
    pub struct Flags: u8 {
        /// Left-align the output of this placeholder. (The default is to
        /// right-align the output.)
        const LEFT_ALIGN = 0b00000001;
        /// Prepends a plus for positive signed-numeric types.
        const PREPEND_PLUS = 0b00000010;
        /// Prepends a space for positive signed-numeric types. Ignored
        /// if [`PREPEND_PLUS`][Flags::PREPEND_PLUS] is present.
        const PREPEND_SPACE = 0b00000100;
        /// When the 'width' option is specified, prepends zeros for numeric
        /// types. (The default prepends spaces.)
        ///
        /// For example, `printf("%4X",3)` produces `   3`, while
        /// `printf("%04X",3)` produces `0003`.
        const PREPEND_ZERO = 0b00001000;
        /// Decimal integers have a `,` inserted every three digits.
        const THOUSANDS_GROUPING = 0b00010000;
        /// Alternate form: `0` for `o`, `0x`/`0X` for non-zero `x`/`X`,
        /// and floats always contain a decimal point.
        const ALTERNATE_FORM = 0b00100000;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DoubleFormat {
    /// `f`
    Normal,
    /// `F`
    UpperNormal,
    /// `e`
    Scientific,
    /// `E`
    UpperScientific,
    /// `g` (rendered as `f`)
    Auto,
    /// `G` (rendered as `F`)
    UpperAuto,
}

impl DoubleFormat {
    fn is_upper(self) -> bool {
        matches!(
            self,
            DoubleFormat::UpperNormal | DoubleFormat::UpperScientific | DoubleFormat::UpperAuto
        )
    }
}

/// A [format specifier](https://en.wikipedia.org/wiki/Printf_format_string#Type_field).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// `d`, `i`
    Int,
    /// `u`
    Uint,
    /// `o`
    Octal,
    /// `x`
    Hex,
    /// `X`
    UpperHex,
    /// `f`, `F`, `e`, `E`, `g`, `G`
    Double { format: DoubleFormat },
    /// `s`
    String,
    /// `c`
    Char,
    /// `p`
    Pointer,
    /// `%`
    Percent,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Length {
    Int,
    /// `hh`
    Char,
    /// `h`
    Short,
    /// `l`
    Long,
    /// `ll`
    LongLong,
    /// `z`
    Usize,
    /// `t`
    Isize,
}

impl Length {
    /// Reduce a signed value to the width this modifier selects
    fn signed(self, value: i64) -> i64 {
        match self {
            Length::Int => value as i32 as i64,
            Length::Char => value as i8 as i64,
            Length::Short => value as i16 as i64,
            Length::Long | Length::LongLong | Length::Usize | Length::Isize => value,
        }
    }

    /// Reduce an unsigned value to the width this modifier selects
    fn unsigned(self, value: u64) -> u64 {
        match self {
            Length::Int => value as u32 as u64,
            Length::Char => value as u8 as u64,
            Length::Short => value as u16 as u64,
            Length::Long | Length::LongLong | Length::Usize | Length::Isize => value,
        }
    }
}

/// A parsed `%` directive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Directive {
    pub flags: Flags,
    pub width: usize,
    pub precision: Option<usize>,
    pub length: Length,
    pub specifier: Specifier,
    /// The conversion character as written
    pub conversion: u8,
}

fn next_char(sub: &[u8]) -> &[u8] {
    sub.get(1..).unwrap_or(&[])
}

/// Parse the [Flags field](https://en.wikipedia.org/wiki/Printf_format_string#Flags_field).
pub fn parse_flags(mut sub: &[u8]) -> (Flags, &[u8]) {
    let mut flags: Flags = Flags::empty();
    while let Some(&ch) = sub.first() {
        flags.insert(match ch {
            b'-' => Flags::LEFT_ALIGN,
            b'+' => Flags::PREPEND_PLUS,
            b' ' => Flags::PREPEND_SPACE,
            b'0' => Flags::PREPEND_ZERO,
            b'\'' => Flags::THOUSANDS_GROUPING,
            b'#' => Flags::ALTERNATE_FORM,
            _ => break,
        });
        sub = next_char(sub)
    }
    (flags, sub)
}

/// Parse the [Width
/// field](https://en.wikipedia.org/wiki/Printf_format_string#Width_field).
///
/// Does not support the dynamic argument '*' specifier
pub fn parse_width(mut sub: &[u8]) -> (usize, &[u8]) {
    let mut width: usize = 0;
    while let Some(&ch) = sub.first() {
        match ch {
            b'0'..=b'9' => {
                width = width
                    .saturating_mul(10)
                    .saturating_add((ch & 0x0f) as usize)
            }
            _ => break,
        }
        sub = next_char(sub);
    }
    (width, sub)
}

/// Parse the [Precision
/// field](https://en.wikipedia.org/wiki/Printf_format_string#Precision_field).
pub fn parse_precision(sub: &[u8]) -> (Option<usize>, &[u8]) {
    match sub.first() {
        Some(&b'.') => {
            let (prec, sub) = parse_width(next_char(sub));
            (Some(prec), sub)
        }
        _ => (None, sub),
    }
}

/// Parse the [Length field](https://en.wikipedia.org/wiki/Printf_format_string#Length_field).
pub fn parse_length(sub: &[u8]) -> (Length, &[u8]) {
    match sub.first().copied() {
        Some(b'h') => match sub.get(1).copied() {
            Some(b'h') => (Length::Char, sub.get(2..).unwrap_or(&[])),
            _ => (Length::Short, next_char(sub)),
        },
        Some(b'l') => match sub.get(1).copied() {
            Some(b'l') => (Length::LongLong, sub.get(2..).unwrap_or(&[])),
            _ => (Length::Long, next_char(sub)),
        },
        Some(b'z') => (Length::Usize, next_char(sub)),
        Some(b't') => (Length::Isize, next_char(sub)),
        _ => (Length::Int, sub),
    }
}

/// Parse the directive following a `%`
///
/// Returns the directive and the remainder of the spec, or `None` if
/// the conversion character is missing or unknown.
pub fn parse_directive(sub: &[u8]) -> Option<(Directive, &[u8])> {
    let (flags, sub) = parse_flags(sub);
    let (width, sub) = parse_width(sub);
    let (precision, sub) = parse_precision(sub);
    let (length, sub) = parse_length(sub);
    let ch = *sub.first()?;

    let specifier = match ch {
        b'd' | b'i' => Specifier::Int,
        b'u' => Specifier::Uint,
        b'o' => Specifier::Octal,
        b'x' => Specifier::Hex,
        b'X' => Specifier::UpperHex,
        b'f' => Specifier::Double {
            format: DoubleFormat::Normal,
        },
        b'F' => Specifier::Double {
            format: DoubleFormat::UpperNormal,
        },
        b'e' => Specifier::Double {
            format: DoubleFormat::Scientific,
        },
        b'E' => Specifier::Double {
            format: DoubleFormat::UpperScientific,
        },
        b'g' => Specifier::Double {
            format: DoubleFormat::Auto,
        },
        b'G' => Specifier::Double {
            format: DoubleFormat::UpperAuto,
        },
        b's' => Specifier::String,
        b'c' => Specifier::Char,
        b'p' => Specifier::Pointer,
        b'%' => Specifier::Percent,
        _ => return None,
    };

    Some((
        Directive {
            flags,
            width,
            precision,
            length,
            specifier,
            conversion: ch,
        },
        next_char(sub),
    ))
}

/// A formatting argument
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    /// `None` is a null pointer
    Str(Option<&'a [u8]>),
    Pointer(usize),
}

impl<'a> Arg<'a> {
    /// Name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Int(_) => "integer",
            Arg::Uint(_) => "unsigned",
            Arg::Float(_) => "float",
            Arg::Char(_) => "char",
            Arg::Str(_) => "string",
            Arg::Pointer(_) => "pointer",
        }
    }
}

macro_rules! arg_from {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(impl<'a> From<$t> for Arg<'a> {
            fn from(value: $t) -> Self {
                Arg::$variant(value as $target)
            }
        })*
    };
}

arg_from!(Int, i64, i8, i16, i32, i64, isize);
arg_from!(Uint, u64, u16, u32, u64, usize);
arg_from!(Float, f64, f32, f64);

impl<'a> From<u8> for Arg<'a> {
    fn from(value: u8) -> Self {
        Arg::Char(value)
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(value: &'a [u8]) -> Self {
        Arg::Str(Some(value))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(Some(value.as_bytes()))
    }
}

impl<'a> From<Option<&'a str>> for Arg<'a> {
    fn from(value: Option<&'a str>) -> Self {
        Arg::Str(value.map(str::as_bytes))
    }
}

impl<'a, T> From<*const T> for Arg<'a> {
    fn from(value: *const T) -> Self {
        Arg::Pointer(value as usize)
    }
}

/// Error while processing a printf format
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("no argument {index} for directive %{directive}")]
    MissingArgument { index: usize, directive: char },
    #[error("argument {index} is a {found}, which does not suit %{directive}")]
    ArgumentMismatch {
        index: usize,
        directive: char,
        found: &'static str,
    },
    #[error("width or precision {requested} of %{directive} is too large")]
    FieldTooWide { directive: char, requested: usize },
}

impl FormatError {
    pub fn errno(&self) -> i32 {
        match self {
            FormatError::FieldTooWide { .. } => EOVERFLOW,
            _ => EINVAL,
        }
    }
}

/// Walks the argument list, checking each against its directive
struct Args<'s, 'a> {
    args: &'s [Arg<'a>],
    next: usize,
}

impl<'s, 'a> Args<'s, 'a> {
    fn take(&mut self, directive: &Directive) -> Result<(usize, Arg<'a>), FormatError> {
        let index = self.next;
        let arg = self
            .args
            .get(index)
            .copied()
            .ok_or(FormatError::MissingArgument {
                index,
                directive: directive.conversion as char,
            })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn mismatch(directive: &Directive, index: usize, arg: &Arg) -> FormatError {
        FormatError::ArgumentMismatch {
            index,
            directive: directive.conversion as char,
            found: arg.kind(),
        }
    }

    fn signed(&mut self, directive: &Directive) -> Result<i64, FormatError> {
        let (index, arg) = self.take(directive)?;
        let value = match arg {
            Arg::Int(i) => i,
            Arg::Uint(u) => u as i64,
            Arg::Char(c) => c as i64,
            _ => return Err(Self::mismatch(directive, index, &arg)),
        };
        Ok(directive.length.signed(value))
    }

    fn unsigned(&mut self, directive: &Directive) -> Result<u64, FormatError> {
        let (index, arg) = self.take(directive)?;
        let value = match arg {
            Arg::Uint(u) => u,
            Arg::Int(i) => i as u64,
            Arg::Char(c) => c as u64,
            Arg::Pointer(p) => p as u64,
            _ => return Err(Self::mismatch(directive, index, &arg)),
        };
        Ok(directive.length.unsigned(value))
    }

    fn float(&mut self, directive: &Directive) -> Result<f64, FormatError> {
        match self.take(directive)? {
            (_, Arg::Float(f)) => Ok(f),
            (index, arg) => Err(Self::mismatch(directive, index, &arg)),
        }
    }

    fn char(&mut self, directive: &Directive) -> Result<u8, FormatError> {
        match self.take(directive)? {
            (_, Arg::Char(c)) => Ok(c),
            (_, Arg::Int(i)) => Ok(i as u8),
            (_, Arg::Uint(u)) => Ok(u as u8),
            (index, arg) => Err(Self::mismatch(directive, index, &arg)),
        }
    }

    fn string(&mut self, directive: &Directive) -> Result<Option<&'a [u8]>, FormatError> {
        match self.take(directive)? {
            (_, Arg::Str(s)) => Ok(s),
            (index, arg) => Err(Self::mismatch(directive, index, &arg)),
        }
    }

    fn pointer(&mut self, directive: &Directive) -> Result<usize, FormatError> {
        match self.take(directive)? {
            (_, Arg::Pointer(p)) => Ok(p),
            (_, Arg::Uint(u)) => Ok(u as usize),
            (index, arg) => Err(Self::mismatch(directive, index, &arg)),
        }
    }
}

/// Write `prefix` and `body` padded to `width`
fn write_padded(out: &mut Vec<u8>, flags: Flags, width: usize, zero_pad: bool, prefix: &[u8], body: &[u8]) {
    let fill = width.saturating_sub(prefix.len() + body.len());
    if flags.contains(Flags::LEFT_ALIGN) {
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
        out.resize(out.len() + fill, b' ');
    } else if zero_pad {
        out.extend_from_slice(prefix);
        out.resize(out.len() + fill, b'0');
        out.extend_from_slice(body);
    } else {
        out.resize(out.len() + fill, b' ');
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
    }
}

fn sign_prefix(flags: Flags, negative: bool) -> &'static [u8] {
    if negative {
        b"-"
    } else if flags.contains(Flags::PREPEND_PLUS) {
        b"+"
    } else if flags.contains(Flags::PREPEND_SPACE) {
        b" "
    } else {
        b""
    }
}

fn group_thousands(digits: &[u8]) -> Vec<u8> {
    let mut grouped = Vec::with_capacity(digits.len() + digits.len() / 3);
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(b',');
        }
        grouped.push(*d);
    }
    grouped
}

fn write_integer(out: &mut Vec<u8>, directive: &Directive, negative: bool, magnitude: u64) {
    let flags = directive.flags;
    let (base, upper) = match directive.specifier {
        Specifier::Octal => (8, false),
        Specifier::Hex => (16, false),
        Specifier::UpperHex => (16, true),
        _ => (10, false),
    };

    let mut digits = vec![];
    if !(directive.precision == Some(0) && magnitude == 0) {
        unsigned_to_text(&mut digits, magnitude, base, upper);
    }
    if base == 10 && flags.contains(Flags::THOUSANDS_GROUPING) {
        digits = group_thousands(&digits);
    }
    if let Some(precision) = directive.precision {
        if digits.len() < precision {
            let mut padded = vec![b'0'; precision - digits.len()];
            padded.extend_from_slice(&digits);
            digits = padded;
        }
    }

    let alternate = flags.contains(Flags::ALTERNATE_FORM);
    let prefix: &[u8] = match directive.specifier {
        Specifier::Int => sign_prefix(flags, negative),
        Specifier::Octal if alternate && digits.first() != Some(&b'0') => b"0",
        Specifier::Hex if alternate && magnitude != 0 => b"0x",
        Specifier::UpperHex if alternate && magnitude != 0 => b"0X",
        _ => b"",
    };

    let zero_pad = flags.contains(Flags::PREPEND_ZERO) && directive.precision.is_none();
    write_padded(out, flags, directive.width, zero_pad, prefix, &digits);
}

fn write_double(out: &mut Vec<u8>, directive: &Directive, format: DoubleFormat, value: f64) {
    let flags = directive.flags;
    let precision = directive.precision.unwrap_or(DEFAULT_PRECISION);
    let negative = value.is_sign_negative() && value != 0.0 && !value.is_nan();

    let mut body = vec![];
    match format {
        DoubleFormat::Scientific | DoubleFormat::UpperScientific => {
            scientific_to_text(&mut body, value.abs(), precision, format.is_upper());
        }
        _ => {
            float_to_text(&mut body, value.abs(), precision);
            if format.is_upper() {
                body.make_ascii_uppercase();
            }
        }
    }

    let finite = value.is_finite();
    if finite && precision == 0 && flags.contains(Flags::ALTERNATE_FORM) {
        match body.iter().position(|c| *c == b'e' || *c == b'E') {
            Some(at) => body.insert(at, b'.'),
            None => body.push(b'.'),
        }
    }

    let zero_pad = finite && flags.contains(Flags::PREPEND_ZERO);
    write_padded(out, flags, directive.width, zero_pad, sign_prefix(flags, negative), &body);
}

fn write_directive(out: &mut Vec<u8>, directive: &Directive, args: &mut Args) -> Result<(), FormatError> {
    let flags = directive.flags;
    let width = directive.width;
    let requested = width.max(directive.precision.unwrap_or(0));
    if requested > MAX_FIELD {
        return Err(FormatError::FieldTooWide {
            directive: directive.conversion as char,
            requested,
        });
    }
    match directive.specifier {
        Specifier::Int => {
            let value = args.signed(directive)?;
            write_integer(out, directive, value < 0, value.unsigned_abs());
        }
        Specifier::Uint | Specifier::Octal | Specifier::Hex | Specifier::UpperHex => {
            let value = args.unsigned(directive)?;
            write_integer(out, directive, false, value);
        }
        Specifier::Double { format } => {
            let value = args.float(directive)?;
            write_double(out, directive, format, value);
        }
        Specifier::Char => {
            let c = args.char(directive)?;
            write_padded(out, flags, width, false, b"", &[c]);
        }
        Specifier::String => {
            let s = cstr(args.string(directive)?.unwrap_or(b"(null)"));
            let s = match directive.precision {
                Some(p) if p < s.len() => &s[..p],
                _ => s,
            };
            write_padded(out, flags, width, false, b"", s);
        }
        Specifier::Pointer => {
            let address = args.pointer(directive)? as u64;
            let mut digits = vec![];
            unsigned_to_text(&mut digits, address, 16, false);
            let mut body = vec![b'0'; 16usize.saturating_sub(digits.len())];
            body.extend_from_slice(&digits);
            write_padded(out, flags, width, false, b"0x", &body);
        }
        Specifier::Percent => out.push(b'%'),
    }
    Ok(())
}

/// Append the formatted output to `dest`, returning the number of
/// bytes written
pub fn format<S: AsRef<[u8]> + ?Sized>(
    dest: &mut Vec<u8>,
    spec: &S,
    args: &[Arg],
) -> Result<usize, FormatError> {
    let start = dest.len();
    let mut args = Args { args, next: 0 };
    let mut spec = cstr(spec.as_ref());

    while let Some(at) = spec.iter().position(|c| *c == b'%') {
        dest.extend_from_slice(&spec[..at]);
        let directive_text = &spec[at..];
        match parse_directive(next_char(directive_text)) {
            Some((directive, rest)) => {
                write_directive(dest, &directive, &mut args)?;
                spec = rest;
            }
            None => {
                // copy the unrecognised directive through as written
                let (_, after_flags) = parse_flags(next_char(directive_text));
                let (_, after_width) = parse_width(after_flags);
                let (_, after_precision) = parse_precision(after_width);
                let (_, after_length) = parse_length(after_precision);
                let consumed = (directive_text.len() - after_length.len() + 1)
                    .min(directive_text.len());
                dest.extend_from_slice(&directive_text[..consumed]);
                spec = &directive_text[consumed..];
            }
        }
    }
    dest.extend_from_slice(spec);
    Ok(dest.len() - start)
}

/// snprintf: write at most `buf.len() - 1` bytes and a terminating
/// NUL, returning the length the full output would have had
pub fn format_into<S: AsRef<[u8]> + ?Sized>(
    buf: &mut [u8],
    spec: &S,
    args: &[Arg],
) -> Result<usize, FormatError> {
    let mut out = vec![];
    let len = format(&mut out, spec, args)?;
    if let Some(room) = buf.len().checked_sub(1) {
        let n = room.min(len);
        memcpy(buf, &out, n);
        buf[n] = 0;
    }
    Ok(len)
}

/// Format to a `String` (invalid UTF-8 is replaced)
pub fn sprintf<S: AsRef<[u8]> + ?Sized>(spec: &S, args: &[Arg]) -> Result<String, FormatError> {
    let mut out = vec![];
    format(&mut out, spec, args)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
