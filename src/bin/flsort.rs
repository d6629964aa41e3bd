use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use flsort::common::io::FlushMode;
use flsort::common::{io_error_msg, reset_sigpipe};
use flsort::sort::{
    Direction, LsortConfig, LsortError, Relocation, Reporter, parse_size, sort_file,
};

const TOOL_NAME: &str = "flsort";

#[derive(Parser)]
#[command(
    name = "flsort",
    version,
    about = "Sort almost-sorted FILE(s), works in-place",
    after_help = "N may be followed by the multiplicative suffixes\n\
                  B=1, K=1024, and so on for M, G, T, P, E.\n\n\
                  By default, --compare is 0, meaning no limit when comparing lines.\n\
                  A non-zero value for --compare may result in non-sorted files."
)]
struct Cli {
    /// Compare no more than N characters per line (0 = no limit)
    #[arg(short = 'c', long = "compare", value_name = "N")]
    compare: Option<String>,

    /// Maximum shift distance in bytes (0 = no limit)
    #[arg(short = 'd', long = "distance", value_name = "N")]
    distance: Option<String>,

    /// Use synchronous writes
    #[arg(long = "sync")]
    sync: bool,

    /// Suppress progress output (default when stdout is not a terminal)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Report changes to the file
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Files to sort in place
    #[arg(value_name = "FILE", required = true)]
    files: Vec<String>,
}

/// Set by the SIGINT/SIGTERM handler, polled by the engine once per
/// line considered so an interrupt stops work without tearing a splice.
static CANCEL: AtomicBool = AtomicBool::new(false);

extern "C" fn stop(_signal: libc::c_int) {
    CANCEL.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    #[cfg(unix)]
    unsafe {
        let handler = stop as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

/// Prints `\r<file>: <pct>%` progress and, with --verbose, one line per
/// relocation. Progress reprints after each verbose line so the running
/// percentage stays visible at the bottom.
struct ConsoleReporter<'a> {
    filename: &'a str,
    quiet: bool,
    verbose: bool,
    last_progress: u64,
}

impl<'a> ConsoleReporter<'a> {
    fn new(filename: &'a str, quiet: bool, verbose: bool) -> Self {
        ConsoleReporter {
            filename,
            quiet,
            verbose,
            last_progress: u64::MAX,
        }
    }

    /// End the progress line before a message goes to another stream.
    fn break_line(&self) {
        if !self.quiet && self.last_progress != u64::MAX {
            println!();
        }
    }
}

impl Reporter for ConsoleReporter<'_> {
    fn progress(&mut self, percent: u64) {
        self.last_progress = percent;
        if !self.quiet {
            print!("\r{}: {}%", self.filename, percent);
            let _ = io::stdout().flush();
        }
    }

    fn relocated(&mut self, r: &Relocation) {
        if !self.verbose {
            return;
        }
        match r.direction {
            Direction::Back => {
                println!("\r{}:{}: moved back to line {}", self.filename, r.line, r.to_line);
            }
            Direction::Forward => {
                println!("\r{}:{}: moved forward to line {}", self.filename, r.line, r.to_line);
            }
        }
        if !self.quiet && self.last_progress != u64::MAX {
            print!("{}: {}%", self.filename, self.last_progress);
            let _ = io::stdout().flush();
        }
    }
}

fn main() {
    reset_sigpipe();
    install_signal_handlers();

    let cli = Cli::parse();

    let parse_arg = |arg: &Option<String>| -> usize {
        match arg {
            Some(s) => match parse_size(s) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("{}: {}", TOOL_NAME, e);
                    process::exit(1);
                }
            },
            None => 0,
        }
    };

    let config = LsortConfig {
        max_compare: parse_arg(&cli.compare),
        max_distance: parse_arg(&cli.distance),
        flush: if cli.sync { FlushMode::Sync } else { FlushMode::Async },
    };

    let quiet = cli.quiet || !io::stdout().is_terminal();

    let mut exit_code = 0;
    let mut aborted = false;

    for file in &cli.files {
        if CANCEL.load(Ordering::Relaxed) {
            aborted = true;
            break;
        }

        let mut reporter = ConsoleReporter::new(file, quiet, cli.verbose);
        match sort_file(Path::new(file), &config, &mut reporter, &CANCEL) {
            Ok(()) => {
                if !quiet {
                    println!("\r{}: done", file);
                }
            }
            Err(LsortError::Cancelled) => {
                aborted = true;
                break;
            }
            Err(LsortError::Io(e)) => {
                reporter.break_line();
                eprintln!("{}: {}", file, io_error_msg(&e));
                exit_code = 1;
            }
            Err(e) => {
                // DistanceExceeded / OutOfMemory carry the line number;
                // report and keep going with the remaining files.
                reporter.break_line();
                eprintln!("{}:{}", file, e);
                exit_code = 1;
            }
        }
    }

    if aborted {
        if !quiet {
            println!();
        }
        eprintln!("{}: ABORTED", TOOL_NAME);
        process::exit(1);
    }

    if exit_code != 0 {
        process::exit(exit_code);
    }
}
