//! Capture-to-capture comparison

use std::io::Write;
use std::path::Path;

use crate::compare::{Comparator, DiffReport};
use crate::error::Result;
use crate::opcodes::OpcodeTable;
use crate::trace::read_capture;

/// Decode both captures and compare their responses
pub fn diff_captures<P: AsRef<Path>, Q: AsRef<Path>>(
    expected: P,
    actual: Q,
    comparator: &Comparator,
) -> Result<DiffReport> {
    let (_, _, expected) = read_capture(expected)?;
    let (_, _, actual) = read_capture(actual)?;
    Ok(comparator.compare(&expected, &actual))
}

/// Write one line per diff, then a summary line
pub fn write_diff<W: Write>(report: &DiffReport, table: &OpcodeTable, out: &mut W) -> Result<()> {
    for diff in report {
        writeln!(out, "{}", diff.display(table))?;
    }

    let summary = report.summary();
    if report.is_identical() {
        writeln!(
            out,
            "No differences ({} responses compared)",
            summary.expected_responses
        )?;
    } else {
        writeln!(
            out,
            "{} differences: {} missing, {} opcode mismatches, {} size deltas, {} payload mismatches, {} extra",
            report.len(),
            summary.missing,
            summary.opcode_mismatches,
            summary.size_deltas,
            summary.payload_mismatches,
            summary.unexpected_extra
        )?;
    }
    out.flush()?;
    Ok(())
}
