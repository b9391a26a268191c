//! Inspection Surface
//!
//! Read-only views over a capture, one per [`Mode`]:
//!
//! - `dump`: human-readable listing, streamed record by record
//! - `json`: one pretty-printed JSON document
//! - `stats`: per-opcode histogram plus per-direction totals
//! - `replay`: validated, then reported as not implemented
//! - `diff`: compare against a second capture
//!
//! Every view writes to a caller-supplied [`std::io::Write`] and returns
//! errors instead of exiting; turning errors into exit codes is the CLI's job.

mod diff;
mod dump;
mod json;
mod replay;
mod stats;

pub use diff::{diff_captures, write_diff};
pub use dump::dump;
pub use json::{capture_json, export_json, CaptureJson, HeaderJson, PacketJson};
pub use replay::{replay, ReplayPlan};
pub use stats::{DirectionTotals, OpcodeStats, TraceStats};

use std::time::Duration;

use crate::error::CaptureError;

/// What to do with a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dump,
    Json,
    Stats,
    Replay,
    Diff,
}

impl Mode {
    /// All modes in help order
    pub const ALL: [Mode; 5] = [Mode::Dump, Mode::Json, Mode::Stats, Mode::Replay, Mode::Diff];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dump => "dump",
            Mode::Json => "json",
            Mode::Stats => "stats",
            Mode::Replay => "replay",
            Mode::Diff => "diff",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CaptureError::UnknownMode { mode: s.to_string() })
    }
}

/// Render a nanosecond offset the way durations print in listings
/// (`0ns`, `1.5ms`, `-20µs`)
pub fn format_elapsed(ns: i64) -> String {
    let magnitude = Duration::from_nanos(ns.unsigned_abs());
    if ns < 0 {
        format!("-{:?}", magnitude)
    } else {
        format!("{:?}", magnitude)
    }
}
