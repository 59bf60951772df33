//! Calendar fields to text, using the printf engine for padding

use crate::text::printf::{format, sprintf, Arg, FormatError};
use crate::text::string::{cstr, memcpy};

use super::calendar::CalendarFields;

/// `Www Mmm dd hh:mm:ss yyyy\n`
pub fn asctime(fields: &CalendarFields) -> Result<String, FormatError> {
    sprintf(
        "%s %s %2d %02d:%02d:%02d %ld\n",
        &[
            fields.weekday_abbrev().into(),
            fields.month_abbrev().into(),
            fields.day.into(),
            fields.hour.into(),
            fields.minute.into(),
            fields.second.into(),
            fields.year.into(),
        ],
    )
}

/// 12-hour clock hour, 12 for midnight and noon
fn twelve_hour(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        h => h,
    }
}

/// Append the expansion of one `%` conversion for `fields` to `out`
fn expand(out: &mut Vec<u8>, conversion: u8, fields: &CalendarFields) -> Result<(), FormatError> {
    let f = fields;
    let (spec, args): (&str, Vec<Arg>) = match conversion {
        b'a' => ("%s", vec![f.weekday_abbrev().into()]),
        b'A' => ("%s", vec![f.weekday_name().into()]),
        b'b' => ("%s", vec![f.month_abbrev().into()]),
        b'B' => ("%s", vec![f.month_name().into()]),
        b'c' => (
            "%s %s %2d %02d:%02d:%02d %ld",
            vec![
                f.weekday_abbrev().into(),
                f.month_abbrev().into(),
                f.day.into(),
                f.hour.into(),
                f.minute.into(),
                f.second.into(),
                f.year.into(),
            ],
        ),
        b'd' => ("%02d", vec![f.day.into()]),
        b'H' => ("%02d", vec![f.hour.into()]),
        b'I' => ("%02d", vec![twelve_hour(f.hour).into()]),
        b'j' => ("%03d", vec![(f.yearday + 1).into()]),
        b'm' => ("%02d", vec![f.month.into()]),
        b'M' => ("%02d", vec![f.minute.into()]),
        b'p' => ("%s", vec![(if f.hour < 12 { "AM" } else { "PM" }).into()]),
        b'S' => ("%02d", vec![f.second.into()]),
        b'U' => ("%02d", vec![((f.yearday + 7 - f.weekday) / 7).into()]),
        b'w' => ("%d", vec![f.weekday.into()]),
        b'W' => {
            let monday_based = (f.weekday + 6) % 7;
            ("%02d", vec![((f.yearday + 7 - monday_based) / 7).into()])
        }
        b'x' => (
            "%02d/%02d/%04ld",
            vec![f.month.into(), f.day.into(), f.year.into()],
        ),
        b'X' => (
            "%02d:%02d:%02d",
            vec![f.hour.into(), f.minute.into(), f.second.into()],
        ),
        b'y' => ("%02ld", vec![f.year.rem_euclid(100).into()]),
        b'Y' => ("%04ld", vec![f.year.into()]),
        b'%' => ("%%", vec![]),
        other => {
            out.push(b'%');
            out.push(other);
            return Ok(());
        }
    };
    format(out, spec, &args)?;
    Ok(())
}

/// Expand `%` directives in `spec` against `fields`
pub fn strftime<S: AsRef<[u8]> + ?Sized>(
    spec: &S,
    fields: &CalendarFields,
) -> Result<String, FormatError> {
    let mut out = vec![];
    let mut spec = cstr(spec.as_ref()).iter();
    while let Some(&c) = spec.next() {
        if c != b'%' {
            out.push(c);
            continue;
        }
        match spec.next() {
            Some(&conversion) => expand(&mut out, conversion, fields)?,
            None => out.push(b'%'),
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Bounded `strftime`: writes at most `buf.len() - 1` bytes plus a
/// NUL and returns the number of bytes written before the NUL
pub fn strftime_into<S: AsRef<[u8]> + ?Sized>(
    buf: &mut [u8],
    spec: &S,
    fields: &CalendarFields,
) -> Result<usize, FormatError> {
    let text = strftime(spec, fields)?;
    let room = match buf.len().checked_sub(1) {
        Some(room) => room,
        None => return Ok(0),
    };
    let n = room.min(text.len());
    memcpy(buf, text.as_bytes(), n);
    buf[n] = 0;
    Ok(n)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::time::calendar::epoch_to_fields;

    #[test]
    pub fn test_asctime() {
        assert_eq!(asctime(&epoch_to_fields(0)).unwrap(), "Thu Jan  1 00:00:00 1970\n");
        assert_eq!(
            asctime(&epoch_to_fields(1_709_175_845)).unwrap(),
            "Thu Feb 29 03:04:05 2024\n"
        );
    }

    #[test]
    pub fn test_names() {
        let f = epoch_to_fields(0);
        assert_eq!(strftime("%a %A %b %B", &f).unwrap(), "Thu Thursday Jan January");
    }

    #[test]
    pub fn test_numeric_fields() {
        let f = epoch_to_fields(1_709_175_845);
        assert_eq!(strftime("%Y-%m-%d %H:%M:%S", &f).unwrap(), "2024-02-29 03:04:05");
        assert_eq!(strftime("%y %j %w %I%p", &f).unwrap(), "24 060 4 03AM");
        assert_eq!(strftime("%x %X", &f).unwrap(), "02/29/2024 03:04:05");
        assert_eq!(strftime("%c", &f).unwrap(), "Thu Feb 29 03:04:05 2024");
    }

    #[test]
    pub fn test_week_numbers() {
        let f = epoch_to_fields(0);
        assert_eq!(strftime("%U %W", &f).unwrap(), "00 00");
        // Sunday 1970-01-04 starts week 1 when weeks begin on Sunday
        let f = epoch_to_fields(3 * 86400);
        assert_eq!(strftime("%U %W", &f).unwrap(), "01 00");
        // Monday 1970-01-05 starts week 1 when weeks begin on Monday
        let f = epoch_to_fields(4 * 86400);
        assert_eq!(strftime("%U %W", &f).unwrap(), "01 01");
    }

    #[test]
    pub fn test_twelve_hour_clock() {
        let midnight = epoch_to_fields(0);
        let afternoon = epoch_to_fields(13 * 3600);
        assert_eq!(strftime("%I %p", &midnight).unwrap(), "12 AM");
        assert_eq!(strftime("%I %p", &afternoon).unwrap(), "01 PM");
    }

    #[test]
    pub fn test_unknown_and_percent() {
        let f = epoch_to_fields(0);
        assert_eq!(strftime("100%% %Q %", &f).unwrap(), "100% %Q %");
    }

    #[test]
    pub fn test_bounded() {
        let f = epoch_to_fields(0);
        let mut buf = [0xffu8; 5];
        assert_eq!(strftime_into(&mut buf, "%Y-%m", &f).unwrap(), 4);
        assert_eq!(&buf, b"1970\0");
    }
}
