//! Formatting, scanning and numeric parsing checked against each other
use freelibc::text::numeric::{parse_float, parse_integer, parse_unsigned};
use freelibc::text::printf::{format_into, sprintf, Arg};
use freelibc::text::scanf::{scan, ScanValue};
use proptest::prelude::*;

proptest! {
    #[test]
    fn printed_integers_parse_back(value in any::<i64>()) {
        let text = sprintf("%ld", &[value.into()]).unwrap();
        let parsed = parse_integer::<i64>(text.as_bytes(), 10).unwrap();
        prop_assert_eq!(parsed.value, value);
        prop_assert_eq!(parsed.rest, text.len());
        prop_assert!(!parsed.overflowed);
    }

    #[test]
    fn printed_hex_parses_back(value in any::<u64>()) {
        let text = sprintf("%#lx", &[value.into()]).unwrap();
        let parsed = parse_unsigned::<u64>(text.as_bytes(), 0).unwrap();
        prop_assert_eq!(parsed.value, value);
        prop_assert_eq!(parsed.rest, text.len());
    }

    #[test]
    fn printed_fields_scan_back(a in any::<i32>(), b in any::<u32>(), word in "[a-z]{1,12}") {
        let text = sprintf("%d %u %s", &[a.into(), b.into(), word.as_str().into()]).unwrap();
        prop_assert_eq!(
            scan(&text, "%d %u %s"),
            vec![
                ScanValue::Int(a as i64),
                ScanValue::Uint(b as u64),
                ScanValue::Str(word.into_bytes()),
            ]
        );
    }

    #[test]
    fn out_of_range_saturates(value in any::<i64>()) {
        prop_assume!(value < i32::MIN as i64 || value > i32::MAX as i64);
        let text = value.to_string();
        let parsed = parse_integer::<i32>(text.as_bytes(), 10).unwrap();
        prop_assert!(parsed.overflowed);
        prop_assert_eq!(parsed.value, if value < 0 { i32::MIN } else { i32::MAX });
    }

    #[test]
    fn printed_floats_parse_close(value in -1.0e6f64..1.0e6) {
        let text = sprintf("%.4f", &[value.into()]).unwrap();
        let parsed = parse_float(text.as_bytes());
        prop_assert_eq!(parsed.rest, text.len());
        prop_assert!((parsed.value - value).abs() < 1.0e-3, "{} -> {} -> {}", value, text, parsed.value);
    }

    #[test]
    fn bounded_output_is_a_prefix(value in any::<i64>(), room in 0usize..32) {
        let full = sprintf("[%ld]", &[value.into()]).unwrap();
        let mut buf = vec![0xffu8; room];
        let len = format_into(&mut buf, "[%ld]", &[Arg::from(value)]).unwrap();
        prop_assert_eq!(len, full.len());
        if room > 0 {
            let written = len.min(room - 1);
            prop_assert_eq!(&buf[..written], &full.as_bytes()[..written]);
            prop_assert_eq!(buf[written], 0);
        }
    }
}

#[test]
pub fn test_width_and_flags_together() {
    assert_eq!(sprintf("%-6d|", &[42.into()]).unwrap(), "42    |");
    assert_eq!(sprintf("%+06d", &[42.into()]).unwrap(), "+00042");
    assert_eq!(sprintf("%'d", &[1234567.into()]).unwrap(), "1,234,567");
}

#[test]
pub fn test_scan_then_print() {
    let values = scan("temp=21.5C id=0x2a", "temp=%fC id=%i");
    assert_eq!(values, vec![ScanValue::Float(21.5), ScanValue::Int(42)]);
    let line = match (&values[0], &values[1]) {
        (ScanValue::Float(t), ScanValue::Int(id)) => {
            sprintf("%ld:%.1f", &[(*id).into(), (*t).into()]).unwrap()
        }
        _ => unreachable!(),
    };
    assert_eq!(line, "42:21.5");
}
