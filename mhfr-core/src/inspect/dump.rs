//! Human-readable capture listing

use std::io::{Read, Write};

use chrono::SecondsFormat;

use crate::error::Result;
use crate::opcodes::OpcodeTable;
use crate::trace::TraceReader;

use super::format_elapsed;

/// Write a listing of `reader` to `out`, one line per record
///
/// Lines are written as records are decoded. If decoding fails part way,
/// everything listed so far stays in `out` and the error is returned.
/// Returns the number of records listed.
pub fn dump<R: Read, W: Write>(
    mut reader: TraceReader<R>,
    label: &str,
    table: &OpcodeTable,
    out: &mut W,
) -> Result<u64> {
    let header = *reader.header();
    let meta = reader.metadata().clone();

    writeln!(out, "=== MHFR Capture: {} ===", label)?;
    writeln!(
        out,
        "Server: {}  ClientMode: {}  Start: {}",
        header.server_type,
        header.client_mode,
        header.start_time().to_rfc3339_opts(SecondsFormat::Nanos, true)
    )?;
    if !meta.host.is_empty() {
        writeln!(out, "Host: {}  Port: {}  Remote: {}", meta.host, meta.port, meta.remote_addr)?;
    }
    if let Some(char_id) = meta.character() {
        writeln!(out, "CharID: {}  UserID: {}", char_id, meta.user_id)?;
    }
    writeln!(out)?;

    let mut count = 0u64;
    loop {
        let record = match reader.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                out.flush()?;
                return Err(e);
            }
        };

        let opcode = record.opcode();
        writeln!(
            out,
            "#{:04}  +{:<12}  {}  0x{:04X} {:<30}  {} bytes",
            count,
            format_elapsed(record.elapsed_ns(header.session_start_ns)),
            record.direction,
            opcode,
            table.name(opcode),
            record.len()
        )?;
        count += 1;
    }

    writeln!(out, "\nTotal: {} packets", count)?;
    out.flush()?;
    Ok(count)
}
