extern crate freelibc;

use std::io::{self, Write};
use std::process;

use freelibc::driver::commands;
use freelibc::driver::options::FreeLibcOptions;
use freelibc::driver::statistics::Statistics;

pub fn main() {
    let opt = FreeLibcOptions::from_args();

    let filter = if opt.debug() { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut statistics = Statistics::default();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match commands::execute(&opt, &mut out, &mut statistics) {
        Ok(()) => {
            if let Err(e) = out.flush() {
                eprintln!("{e}");
                exit(&opt, 1, &statistics);
            }
            exit(&opt, 0, &statistics)
        }
        Err(e) => {
            let _ = out.flush();
            eprintln!("flc: {e} (errno {})", e.errno());
            exit(&opt, 1, &statistics)
        }
    }
}

/// Optionally dump stats to stderr then exit
pub fn exit(opts: &FreeLibcOptions, code: i32, stats: &Statistics) {
    if opts.statistics() {
        eprintln!();
        eprintln!("~~~~~~~~~~");
        eprintln!("STATISTICS");
        eprintln!("~~~~~~~~~~");
        eprintln!();
        eprintln!("{stats}");
    }
    process::exit(code)
}
