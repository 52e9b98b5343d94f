//! Command line front end: parses an ORCA input file and prints its tree.
//!
//! Exits with 0 for a clean parse, 1 when the input has syntax errors and 2
//! when the file cannot be read or the grammar fails to load.

use std::path::PathBuf;
use std::process::ExitCode;

use facet::Facet;
use log::{Level, LevelFilter, Log, Metadata, Record};
use tree_sitter_orca::{language, Parser};

/// Parse an ORCA input file and print its syntax tree.
#[derive(Facet, Debug)]
struct Args {
    /// The input file to parse.
    #[facet(positional)]
    path: String,

    /// Do not print the syntax tree.
    #[facet(named, short = 'q')]
    quiet: bool,

    /// Log grammar and parser diagnostics.
    #[facet(named, short = 'v')]
    verbose: bool,
}

/// Writes log records to stderr as `level: message`.
struct CliLogger;

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                Level::Error => "error",
                Level::Warn => "warn",
                Level::Info => "info",
                Level::Debug => "debug",
                Level::Trace => "trace",
            };
            eprintln!("{level}: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CliLogger = CliLogger;

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Error
        });
    }
}

fn main() -> ExitCode {
    let args: Args = match facet_args::from_std_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    init_logging(args.verbose);

    let path = PathBuf::from(&args.path);
    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            log::error!("{}: {e}", path.display());
            return ExitCode::from(2);
        }
    };

    let mut parser = Parser::new();
    if let Err(e) = language().and_then(|language| parser.set_language(language)) {
        log::error!("Error loading Orca grammar: {e}");
        return ExitCode::from(2);
    }
    let Some(tree) = parser.parse(&source) else {
        log::error!("Error loading Orca grammar");
        return ExitCode::from(2);
    };

    if !args.quiet {
        println!("{}", tree.to_sexp());
    }

    for error in tree.errors() {
        log::error!("{}:{error}", path.display());
    }

    if tree.has_error() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
