//! MHFR Replay CLI - inspect, compare and replay packet captures
//!
//! Usage:
//!     mhfr-replay --capture session.mhfr                     # dump (default)
//!     mhfr-replay --capture session.mhfr --mode json
//!     mhfr-replay --capture session.mhfr --mode stats
//!     mhfr-replay --capture expected.mhfr --mode diff --against actual.mhfr [--strict]
//!     mhfr-replay --capture session.mhfr --mode replay --target 127.0.0.1:54001
//!
//! Exit status is 0 on success and 1 on any error. `diff` also exits 1 when
//! the captures differ.
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `mhfr_core=warn`).

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use mhfr_core::inspect::{self, Mode, TraceStats};
use mhfr_core::{
    read_capture, CaptureError, Comparator, CompareConfig, OpcodeTable, ReplayConfig, Result,
    TraceReader,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mhfr-replay")]
#[command(about = "Inspect, compare and replay .mhfr packet captures")]
#[command(version)]
struct Args {
    /// Path to the .mhfr capture file (required)
    #[arg(short, long)]
    capture: Option<PathBuf>,

    /// Mode: dump, json, stats, replay, diff
    #[arg(short, long, default_value = "dump")]
    mode: String,

    /// Target server address for replay mode (host:port)
    #[arg(long)]
    target: Option<String>,

    /// Replay speed multiplier (e.g. 2.0 = 2x faster)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Capture holding the responses to compare against (diff mode)
    #[arg(long)]
    against: Option<PathBuf>,

    /// Compare payload bytes, not just opcodes and lengths (diff mode)
    #[arg(long)]
    strict: bool,

    /// Opcode name table (JSON); the built-in table is used otherwise
    #[arg(long, env = "MHFR_OPCODES")]
    opcodes: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() { 1 } else { 0 };
            if let Err(io) = e.print() {
                eprintln!("error: {}", io);
            }
            std::process::exit(code);
        }
    };

    init_logging(args.verbose);

    let code = match run(&args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::debug!(code = e.error_code(), category = ?e.category(), "command failed");
            eprintln!("error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mhfr_core=debug" } else { "mhfr_core=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Run the selected mode; `Ok(false)` means the command worked but found drift
fn run(args: &Args) -> Result<bool> {
    let capture = args
        .capture
        .as_deref()
        .ok_or(CaptureError::MissingArgument { name: "--capture" })?;
    let mode: Mode = args.mode.parse()?;
    let table = load_table(args.opcodes.as_deref())?;
    let label = capture.display().to_string();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match mode {
        Mode::Dump => {
            let reader = TraceReader::open(capture)?;
            inspect::dump(reader, &label, &table, &mut out)?;
        }
        Mode::Json => {
            let (header, metadata, records) = read_capture(capture)?;
            inspect::export_json(&header, &metadata, &records, &table, &mut out)?;
        }
        Mode::Stats => {
            let stats = TraceStats::from_reader(TraceReader::open(capture)?)?;
            stats.render(&label, &table, &mut out)?;
        }
        Mode::Replay => {
            let config = ReplayConfig {
                target: args.target.clone(),
                speed: args.speed,
            };
            config.validate()?;
            let (_, _, records) = read_capture(capture)?;
            inspect::replay(&config, &records)?;
        }
        Mode::Diff => {
            let against = args
                .against
                .as_deref()
                .ok_or(CaptureError::MissingArgument { name: "--against" })?;
            let config = if args.strict {
                CompareConfig::exact()
            } else {
                CompareConfig::default()
            };
            let report = inspect::diff_captures(capture, against, &Comparator::new(config))?;
            inspect::write_diff(&report, &table, &mut out)?;
            return Ok(report.is_identical());
        }
    }

    out.flush()?;
    Ok(true)
}

fn load_table(path: Option<&Path>) -> Result<OpcodeTable> {
    match path {
        Some(path) => {
            let table = OpcodeTable::from_path(path)?;
            tracing::debug!(path = %path.display(), version = table.version(), entries = table.len(), "loaded opcode table");
            Ok(table)
        }
        None => Ok(OpcodeTable::builtin()),
    }
}
