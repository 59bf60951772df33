//! Command line argument handling with clap v4 and subcommands.

use clap::{Args, Parser, Subcommand};

use crate::memory::heap::HeapConfig;

/// flc - exercise the freestanding libc core from the command line
#[derive(Parser, Debug, Clone)]
#[command(name = "flc")]
#[command(about = "Freestanding libc core: heap, printf/scanf, strtol/strtod, calendar, math")]
#[command(version)]
pub struct FreeLibcCli {
    /// Turn on debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Print metrics to stderr before exiting
    #[arg(short = 'S', long = "statistics", global = true)]
    pub statistics: bool,

    /// Heap growth quantum in bytes
    #[arg(long = "heap-increment", global = true)]
    pub heap_increment: Option<usize>,

    /// Cap on total heap backing store in bytes
    #[arg(long = "heap-limit", global = true)]
    pub heap_limit: Option<usize>,

    /// Byte value written into fresh allocations
    #[arg(long = "heap-fill", global = true)]
    pub heap_fill: Option<u8>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Format arguments with a printf-style spec
    Printf(PrintfArgs),
    /// Convert fields of text with a scanf-style spec
    Scanf(ScanfArgs),
    /// Parse an integer, strtol style
    Strtol(StrtolArgs),
    /// Parse a floating point number, strtod style
    Strtod(StrtodArgs),
    /// Break epoch seconds into calendar fields
    Gmtime(GmtimeArgs),
    /// Convert a date and time to epoch seconds
    Mktime(MktimeArgs),
    /// Format epoch seconds with a strftime-style spec
    Strftime(StrftimeArgs),
    /// Run a scripted allocator session and print the block map
    Heap(HeapArgs),
    /// Describe an errno value
    Strerror(StrerrorArgs),
    /// Evaluate an elementary function
    Math(MathArgs),
    /// Draw pseudo-random numbers
    Rand(RandArgs),
    /// CRC-32 and djb2 hash of some text
    Checksum(ChecksumArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PrintfArgs {
    /// Format spec
    pub spec: String,

    /// Arguments, converted according to the directive each one feeds
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ScanfArgs {
    /// Scan spec
    pub spec: String,

    /// Input text
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StrtolArgs {
    /// Text to parse
    #[arg(allow_hyphen_values = true)]
    pub text: String,

    /// Base (0 to detect from prefix, or 2 to 36)
    #[arg(short = 'b', long = "base", default_value_t = 0)]
    pub base: u32,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StrtodArgs {
    /// Text to parse
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GmtimeArgs {
    /// Seconds since the epoch (defaults to now)
    #[arg(allow_hyphen_values = true)]
    pub seconds: Option<i64>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct MktimeArgs {
    /// Date and time as YYYY-MM-DDTHH:MM:SS
    #[arg(allow_hyphen_values = true)]
    pub datetime: String,

    /// Daylight saving in effect
    #[arg(long = "dst")]
    pub dst: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StrftimeArgs {
    /// Format spec
    pub spec: String,

    /// Seconds since the epoch (defaults to now)
    #[arg(allow_hyphen_values = true)]
    pub seconds: Option<i64>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct HeapArgs {
    /// Operations: a<N> allocate, z<C>x<S> zero-allocate, r<I>:<N>
    /// resize handle I, f<I> free handle I
    #[arg(required = true)]
    pub ops: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StrerrorArgs {
    /// Error number
    #[arg(allow_hyphen_values = true)]
    pub code: i32,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct MathArgs {
    /// Function to evaluate
    #[arg(value_enum)]
    pub function: MathFunction,

    /// Operands (two for pow, one otherwise)
    #[arg(allow_hyphen_values = true, required = true)]
    pub operands: Vec<f64>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFunction {
    Fabs,
    Sqrt,
    Log,
    Exp,
    /// Base raised to exponent
    Pow,
    Sin,
    Cos,
    Tan,
    Floor,
    Ceil,
    Round,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RandArgs {
    /// Seed for the generator
    #[arg(short = 's', long = "seed", default_value_t = 1)]
    pub seed: u32,

    /// How many numbers to draw
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ChecksumArgs {
    /// Text to checksum
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

/// Processed options
#[derive(Debug, Clone)]
pub struct FreeLibcOptions {
    debug: bool,
    statistics: bool,
    heap_config: HeapConfig,
    command: Commands,
}

impl From<FreeLibcCli> for FreeLibcOptions {
    fn from(cli: FreeLibcCli) -> Self {
        let mut heap_config = HeapConfig::default();
        if let Some(increment) = cli.heap_increment {
            heap_config = heap_config.with_increment(increment);
        }
        if let Some(limit) = cli.heap_limit {
            heap_config = heap_config.with_limit(limit);
        }
        if let Some(fill) = cli.heap_fill {
            heap_config = heap_config.with_fill(fill);
        }

        FreeLibcOptions {
            debug: cli.debug,
            statistics: cli.statistics,
            heap_config: heap_config.build(),
            command: cli.command,
        }
    }
}

impl FreeLibcOptions {
    /// Parse the process arguments
    pub fn from_args() -> Self {
        FreeLibcCli::parse().into()
    }

    /// Options for a command, with default settings
    pub fn for_command(command: Commands) -> Self {
        FreeLibcOptions {
            debug: false,
            statistics: false,
            heap_config: HeapConfig::default(),
            command,
        }
    }

    pub fn with_heap_config(self, heap_config: HeapConfig) -> Self {
        FreeLibcOptions {
            heap_config: heap_config.build(),
            ..self
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn statistics(&self) -> bool {
        self.statistics
    }

    pub fn heap_config(&self) -> &HeapConfig {
        &self.heap_config
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }
}
