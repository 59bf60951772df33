//! Run one `flc` subcommand, writing its report to an output stream

use std::io::Write;
use std::ptr::NonNull;
use std::time::Instant;

use chrono::Utc;
use itertools::Itertools;
use regex::Regex;

use crate::common::errno::{describe, strerror};
use crate::math::checksum::{crc32, hash};
use crate::math::random::Rand;
use crate::math::series;
use crate::memory::heap::Heap;
use crate::text::numeric::{parse_float, parse_integer, parse_unsigned, Parsed};
use crate::text::printf::{format, parse_directive, Arg, Directive, Specifier};
use crate::text::scanf::scan;
use crate::time::calendar::{gmtime, mktime, CalendarFields};
use crate::time::strftime::{asctime, strftime};

use super::error::FreeLibcError;
use super::options::{
    Commands, FreeLibcOptions, HeapArgs, MathArgs, MathFunction, MktimeArgs, PrintfArgs,
};
use super::statistics::Statistics;

lazy_static! {
    static ref DATETIME: Regex =
        Regex::new(r"^(-?\d+)-(\d{1,2})-(\d{1,2})T(\d{1,2}):(\d{1,2}):(\d{1,2})$").unwrap();
    static ref HEAP_OP: Regex =
        Regex::new(r"^(?:a(\d+)|z(\d+)x(\d+)|r(\d+):(\d+)|f(\d+))$").unwrap();
}

/// Execute the command in `opts`
pub fn execute<W: Write>(
    opts: &FreeLibcOptions,
    out: &mut W,
    stats: &mut Statistics,
) -> Result<(), FreeLibcError> {
    let t = Instant::now();
    let name = match opts.command() {
        Commands::Printf(args) => {
            printf(args, out)?;
            "printf"
        }
        Commands::Scanf(args) => {
            let values = scan(&args.text, &args.spec);
            writeln!(out, "{}: {}", values.len(), values.iter().join(" "))?;
            "scanf"
        }
        Commands::Strtol(args) => {
            let parsed = parse_integer::<i64>(args.text.as_bytes(), args.base)?;
            report_parsed("strtol", &args.text, &parsed, out)?;
            "strtol"
        }
        Commands::Strtod(args) => {
            let parsed = parse_float(args.text.as_bytes());
            report_parsed("strtod", &args.text, &parsed, out)?;
            "strtod"
        }
        Commands::Gmtime(args) => {
            let fields = gmtime(args.seconds.unwrap_or_else(now));
            writeln!(out, "{}", fields)?;
            write!(out, "{}", asctime(&fields)?)?;
            writeln!(
                out,
                "weekday {} ({}), yearday {}",
                fields.weekday,
                fields.weekday_name(),
                fields.yearday
            )?;
            "gmtime"
        }
        Commands::Mktime(args) => {
            let fields = parse_datetime(args)?;
            writeln!(out, "{}", mktime(&fields)?)?;
            "mktime"
        }
        Commands::Strftime(args) => {
            let fields = gmtime(args.seconds.unwrap_or_else(now));
            writeln!(out, "{}", strftime(&args.spec, &fields)?)?;
            "strftime"
        }
        Commands::Heap(args) => {
            heap(opts, args, out, stats)?;
            "heap"
        }
        Commands::Strerror(args) => {
            writeln!(out, "{}", strerror(args.code))?;
            "strerror"
        }
        Commands::Math(args) => {
            writeln!(out, "{}", evaluate(args)?)?;
            "math"
        }
        Commands::Rand(args) => {
            writeln!(out, "{}", Rand::new(args.seed).take(args.count).join(" "))?;
            "rand"
        }
        Commands::Checksum(args) => {
            let bytes = args.text.as_bytes();
            writeln!(out, "crc32 {:08x}", crc32(bytes))?;
            writeln!(out, "hash {}", hash(bytes))?;
            "checksum"
        }
    };
    stats.timings_mut().record(name, t.elapsed());
    Ok(())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Value, unconsumed text and any range error of a numeric parse
fn report_parsed<T: std::fmt::Display, W: Write>(
    name: &str,
    text: &str,
    parsed: &Parsed<T>,
    out: &mut W,
) -> Result<(), FreeLibcError> {
    writeln!(out, "{}", parsed.value)?;
    writeln!(
        out,
        "rest: {:?}",
        String::from_utf8_lossy(&text.as_bytes()[parsed.rest..])
    )?;
    if parsed.overflowed {
        writeln!(out, "{}", describe(name, parsed.errno()))?;
    }
    Ok(())
}

/// The argument-consuming directives of a printf spec, in order
fn directives(spec: &[u8]) -> Vec<Directive> {
    let mut found = vec![];
    let mut rest = spec;
    while let Some(at) = rest.iter().position(|c| *c == b'%') {
        match parse_directive(&rest[at + 1..]) {
            Some((directive, after)) => {
                if directive.specifier != Specifier::Percent {
                    found.push(directive);
                }
                rest = after;
            }
            None => rest = &rest[at + 1..],
        }
    }
    found
}

/// A whole command line argument parsed with the library's own
/// numeric conversions
fn whole<T>(
    text: &str,
    directive: &Directive,
    parsed: Parsed<T>,
) -> Result<T, FreeLibcError> {
    if parsed.converted() && parsed.rest == text.len() {
        if parsed.overflowed {
            warn!("{} saturated for %{}", text, directive.conversion as char);
        }
        Ok(parsed.value)
    } else {
        Err(FreeLibcError::BadArgument(format!(
            "{:?} for %{}",
            text, directive.conversion as char
        )))
    }
}

fn printf_arg<'a>(directive: &Directive, text: &'a str) -> Result<Arg<'a>, FreeLibcError> {
    let bytes = text.as_bytes();
    Ok(match directive.specifier {
        Specifier::Int => Arg::Int(whole(text, directive, parse_integer::<i64>(bytes, 0)?)?),
        Specifier::Uint | Specifier::Octal | Specifier::Hex | Specifier::UpperHex => {
            Arg::Uint(whole(text, directive, parse_unsigned::<u64>(bytes, 0)?)?)
        }
        Specifier::Pointer => {
            Arg::Pointer(whole(text, directive, parse_unsigned::<usize>(bytes, 0)?)?)
        }
        Specifier::Double { .. } => Arg::Float(whole(text, directive, parse_float(bytes))?),
        Specifier::Char => match bytes {
            [c] => Arg::Char(*c),
            _ => {
                return Err(FreeLibcError::BadArgument(format!(
                    "{:?} for %c (expected a single byte)",
                    text
                )))
            }
        },
        Specifier::String | Specifier::Percent => Arg::Str(Some(bytes)),
    })
}

fn printf<W: Write>(args: &PrintfArgs, out: &mut W) -> Result<(), FreeLibcError> {
    let directives = directives(args.spec.as_bytes());
    if args.args.len() > directives.len() {
        warn!(
            "{} arguments supplied, spec uses {}",
            args.args.len(),
            directives.len()
        );
    }

    let converted = directives
        .iter()
        .zip(args.args.iter())
        .map(|(directive, text)| printf_arg(directive, text))
        .collect::<Result<Vec<_>, _>>()?;

    let mut buffer = vec![];
    format(&mut buffer, &args.spec, &converted)?;
    out.write_all(&buffer)?;
    Ok(())
}

fn evaluate(args: &MathArgs) -> Result<f64, FreeLibcError> {
    let arity = match args.function {
        MathFunction::Pow => 2,
        _ => 1,
    };
    if args.operands.len() != arity {
        return Err(FreeLibcError::BadArgument(format!(
            "{:?} takes {} operand(s), got {}",
            args.function,
            arity,
            args.operands.len()
        )));
    }

    let x = args.operands[0];
    Ok(match args.function {
        MathFunction::Fabs => series::fabs(x),
        MathFunction::Sqrt => series::sqrt(x),
        MathFunction::Log => series::log(x),
        MathFunction::Exp => series::exp(x),
        MathFunction::Pow => series::pow(x, args.operands[1]),
        MathFunction::Sin => series::sin(x),
        MathFunction::Cos => series::cos(x),
        MathFunction::Tan => series::tan(x),
        MathFunction::Floor => series::floor(x),
        MathFunction::Ceil => series::ceil(x),
        MathFunction::Round => series::round(x),
    })
}

fn datetime_field<T: std::str::FromStr>(text: &str, field: &str) -> Result<T, FreeLibcError> {
    field
        .parse()
        .map_err(|_| FreeLibcError::BadDateTime(text.to_string()))
}

fn parse_datetime(args: &MktimeArgs) -> Result<CalendarFields, FreeLibcError> {
    let text = &args.datetime;
    let captures = DATETIME
        .captures(text)
        .ok_or_else(|| FreeLibcError::BadDateTime(text.clone()))?;
    let field = |i: usize| captures.get(i).map_or("", |m| m.as_str());

    Ok(CalendarFields {
        year: datetime_field(text, field(1))?,
        month: datetime_field(text, field(2))?,
        day: datetime_field(text, field(3))?,
        hour: datetime_field(text, field(4))?,
        minute: datetime_field(text, field(5))?,
        second: datetime_field(text, field(6))?,
        weekday: 0,
        yearday: 0,
        dst: args.dst,
    })
}

fn number(text: &str) -> Result<usize, FreeLibcError> {
    text.parse()
        .map_err(|_| FreeLibcError::BadArgument(text.to_string()))
}

fn handle(handles: &[NonNull<u8>], op: &str, index: usize) -> Result<NonNull<u8>, FreeLibcError> {
    handles
        .get(index)
        .copied()
        .ok_or_else(|| FreeLibcError::BadArgument(format!("{}: no allocation [{}]", op, index)))
}

/// Run a scripted sequence of heap operations and print the block
/// map
///
/// Each allocation is given the next handle number. Freed handles
/// stay in the table so that a repeated free reaches the heap and is
/// reported as a double free.
fn heap<W: Write>(
    opts: &FreeLibcOptions,
    args: &HeapArgs,
    out: &mut W,
    stats: &mut Statistics,
) -> Result<(), FreeLibcError> {
    let mut heap = Heap::new(opts.heap_config().clone());
    let mut handles: Vec<NonNull<u8>> = vec![];

    for op in &args.ops {
        let captures = HEAP_OP
            .captures(op)
            .ok_or_else(|| FreeLibcError::BadArgument(op.clone()))?;
        let field = |i: usize| captures.get(i).map(|m| m.as_str());

        if let Some(size) = field(1) {
            let ptr = heap.allocate(number(size)?)?;
            handles.push(ptr);
            writeln!(out, "{} -> [{}] {} bytes", op, handles.len() - 1, heap.capacity(ptr)?)?;
        } else if let (Some(count), Some(size)) = (field(2), field(3)) {
            let ptr = heap.zero_allocate(number(count)?, number(size)?)?;
            handles.push(ptr);
            writeln!(out, "{} -> [{}] {} bytes", op, handles.len() - 1, heap.capacity(ptr)?)?;
        } else if let (Some(index), Some(size)) = (field(4), field(5)) {
            let index = number(index)?;
            let ptr = handle(&handles, op, index)?;
            match heap.resize(Some(ptr), number(size)?)? {
                Some(moved) => {
                    let how = if moved == ptr { "in place" } else { "moved" };
                    handles[index] = moved;
                    writeln!(out, "{} -> [{}] {} bytes {}", op, index, heap.capacity(moved)?, how)?;
                }
                None => writeln!(out, "{} -> [{}] freed", op, index)?,
            }
        } else if let Some(index) = field(6) {
            let index = number(index)?;
            heap.free(Some(handle(&handles, op, index)?))?;
            writeln!(out, "{} -> [{}] freed", op, index)?;
        }
    }

    heap.check()?;
    write!(out, "{:?}", heap)?;
    stats.set_heap(heap.stats());
    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::driver::options::{
        ChecksumArgs, GmtimeArgs, RandArgs, ScanfArgs, StrerrorArgs, StrftimeArgs, StrtodArgs,
        StrtolArgs,
    };
    use crate::memory::heap::{HeapConfig, HeapError};

    fn run(command: Commands) -> Result<String, FreeLibcError> {
        run_with(FreeLibcOptions::for_command(command))
    }

    fn run_with(opts: FreeLibcOptions) -> Result<String, FreeLibcError> {
        let mut out = vec![];
        let mut stats = Statistics::default();
        execute(&opts, &mut out, &mut stats)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    pub fn test_printf_converts_by_directive() {
        let out = run(Commands::Printf(PrintfArgs {
            spec: "%d|%5s|%x|%.2f|%c|100%%".to_string(),
            args: strings(&["-42", "ab", "255", "1.5", "z"]),
        }))
        .unwrap();
        assert_eq!(out, "-42|   ab|ff|1.50|z|100%");
    }

    #[test]
    pub fn test_printf_bad_and_missing_arguments() {
        let bad = run(Commands::Printf(PrintfArgs {
            spec: "%d".to_string(),
            args: strings(&["12abc"]),
        }));
        assert!(matches!(bad, Err(FreeLibcError::BadArgument(_))));

        let missing = run(Commands::Printf(PrintfArgs {
            spec: "%d %d".to_string(),
            args: strings(&["1"]),
        }));
        assert!(matches!(missing, Err(FreeLibcError::Format(_))));
    }

    #[test]
    pub fn test_printf_refuses_huge_fields() {
        let err = run(Commands::Printf(PrintfArgs {
            spec: "%99999999999999999999d".to_string(),
            args: strings(&["1"]),
        }))
        .unwrap_err();
        assert!(matches!(err, FreeLibcError::Format(_)));
        assert_eq!(err.errno(), crate::common::errno::EOVERFLOW);
    }

    #[test]
    pub fn test_math() {
        let out = run(Commands::Math(MathArgs {
            function: MathFunction::Pow,
            operands: vec![2.0, 10.0],
        }))
        .unwrap();
        assert_eq!(out, "1024\n");
        let out = run(Commands::Math(MathArgs {
            function: MathFunction::Floor,
            operands: vec![-2.5],
        }))
        .unwrap();
        assert_eq!(out, "-3\n");
        let err = run(Commands::Math(MathArgs {
            function: MathFunction::Sqrt,
            operands: vec![1.0, 2.0],
        }));
        assert!(matches!(err, Err(FreeLibcError::BadArgument(_))));
    }

    #[test]
    pub fn test_rand_and_checksum() {
        let out = run(Commands::Rand(RandArgs { seed: 1, count: 3 })).unwrap();
        assert_eq!(out, "16838 5758 10113\n");
        let out = run(Commands::Checksum(ChecksumArgs {
            text: "123456789".to_string(),
        }))
        .unwrap();
        assert!(out.starts_with("crc32 cbf43926\n"));
    }

    #[test]
    pub fn test_scanf() {
        let out = run(Commands::Scanf(ScanfArgs {
            spec: "%d,%s".to_string(),
            text: "12,hello".to_string(),
        }))
        .unwrap();
        assert_eq!(out, "2: 12 \"hello\"\n");
    }

    #[test]
    pub fn test_strtol_reports_rest_and_range() {
        let out = run(Commands::Strtol(StrtolArgs {
            text: "0x1fz".to_string(),
            base: 0,
        }))
        .unwrap();
        assert_eq!(out, "31\nrest: \"z\"\n");

        let out = run(Commands::Strtol(StrtolArgs {
            text: "99999999999999999999".to_string(),
            base: 10,
        }))
        .unwrap();
        assert!(out.starts_with("9223372036854775807\n"));
        assert!(out.ends_with("strtol: Numerical result out of range\n"));

        let err = run(Commands::Strtol(StrtolArgs {
            text: "1".to_string(),
            base: 1,
        }));
        assert!(matches!(err, Err(FreeLibcError::Conversion(_))));
    }

    #[test]
    pub fn test_strtod() {
        let out = run(Commands::Strtod(StrtodArgs {
            text: "2.5e2x".to_string(),
        }))
        .unwrap();
        assert_eq!(out, "250\nrest: \"x\"\n");
    }

    #[test]
    pub fn test_gmtime_and_strftime() {
        let out = run(Commands::Gmtime(GmtimeArgs { seconds: Some(0) })).unwrap();
        assert_eq!(
            out,
            "1970-01-01T00:00:00\nThu Jan  1 00:00:00 1970\nweekday 4 (Thursday), yearday 0\n"
        );

        let out = run(Commands::Strftime(StrftimeArgs {
            spec: "%A %d %B %Y".to_string(),
            seconds: Some(86400),
        }))
        .unwrap();
        assert_eq!(out, "Friday 02 January 1970\n");
    }

    #[test]
    pub fn test_mktime() {
        let out = run(Commands::Mktime(MktimeArgs {
            datetime: "2024-02-29T03:04:05".to_string(),
            dst: false,
        }))
        .unwrap();
        assert_eq!(out, "1709175845\n");

        let out = run(Commands::Mktime(MktimeArgs {
            datetime: "1970-01-01T00:00:00".to_string(),
            dst: true,
        }))
        .unwrap();
        assert_eq!(out, "3600\n");

        let bad = run(Commands::Mktime(MktimeArgs {
            datetime: "yesterday".to_string(),
            dst: false,
        }));
        assert!(matches!(bad, Err(FreeLibcError::BadDateTime(_))));

        let bad = run(Commands::Mktime(MktimeArgs {
            datetime: "2024-13-01T00:00:00".to_string(),
            dst: false,
        }));
        assert!(matches!(bad, Err(FreeLibcError::Time(_))));
    }

    #[test]
    pub fn test_heap_script() {
        let mut out = vec![];
        let mut stats = Statistics::default();
        let opts = FreeLibcOptions::for_command(Commands::Heap(HeapArgs {
            ops: strings(&["a100", "z4x8", "r0:50", "f1", "f0"]),
        }));
        execute(&opts, &mut out, &mut stats).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "a100 -> [0] 104 bytes");
        assert_eq!(lines[1], "z4x8 -> [1] 32 bytes");
        assert_eq!(lines[2], "r0:50 -> [0] 104 bytes in place");
        assert_eq!(lines[3], "f1 -> [1] freed");
        assert_eq!(lines[4], "f0 -> [0] freed");
        // everything coalesced back into one free block
        assert_eq!(lines.len(), 6);
        assert!(lines[5].ends_with("free"));

        let heap = stats.heap().unwrap();
        assert_eq!(heap.counters.allocations, 2);
        assert_eq!(heap.counters.frees, 2);
        assert!(stats.timings().get("heap").is_some());
    }

    #[test]
    pub fn test_heap_script_errors() {
        let double = run(Commands::Heap(HeapArgs {
            ops: strings(&["a8", "f0", "f0"]),
        }));
        assert!(matches!(
            double,
            Err(FreeLibcError::Heap(HeapError::DoubleFree { .. }))
        ));

        let unknown = run(Commands::Heap(HeapArgs {
            ops: strings(&["f3"]),
        }));
        assert!(matches!(unknown, Err(FreeLibcError::BadArgument(_))));

        let garbage = run(Commands::Heap(HeapArgs {
            ops: strings(&["alloc"]),
        }));
        assert!(matches!(garbage, Err(FreeLibcError::BadArgument(_))));
    }

    #[test]
    pub fn test_heap_limit_reaches_out_of_memory() {
        let opts = FreeLibcOptions::for_command(Commands::Heap(HeapArgs {
            ops: strings(&["a1000", "a5000"]),
        }))
        .with_heap_config(HeapConfig::default().with_limit(4096));
        let err = run_with(opts).unwrap_err();
        assert!(matches!(
            err,
            FreeLibcError::Heap(HeapError::OutOfMemory { .. })
        ));
        assert!(err.to_string().contains("failed to allocate 5000 bytes"));
    }

    #[test]
    pub fn test_strerror() {
        let out = run(Commands::Strerror(StrerrorArgs { code: 12 })).unwrap();
        assert_eq!(out, "Cannot allocate memory\n");
    }
}
