//! JSON export
//!
//! ```json
//! {
//!   "header":   { "version": 1, "server_type": "channel", "client_mode": 40, "start_time": "..." },
//!   "metadata": { "host": "", "port": 0, "remote_addr": "", "char_id": 0, "user_id": 0 },
//!   "packets":  [ { "index": 0, "timestamp": "...", "elapsed_ns": 0, "direction": "C→S",
//!                   "opcode": 20, "opcode_name": "MSG_SYS_LOGIN", "payload_len": 3 } ]
//! }
//! ```

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::opcodes::OpcodeTable;
use crate::trace::{Direction, PacketRecord, ServerType, SessionMetadata, TraceHeader};

/// Exported document
#[derive(Debug, Clone, Serialize)]
pub struct CaptureJson {
    pub header: HeaderJson,
    pub metadata: SessionMetadata,
    pub packets: Vec<PacketJson>,
}

/// Exported header
#[derive(Debug, Clone, Serialize)]
pub struct HeaderJson {
    pub version: u16,
    pub server_type: ServerType,
    pub client_mode: u8,
    pub start_time: String,
}

/// One exported record
#[derive(Debug, Clone, Serialize)]
pub struct PacketJson {
    pub index: usize,
    pub timestamp: String,
    pub elapsed_ns: i64,
    pub direction: Direction,
    pub opcode: u16,
    pub opcode_name: String,
    pub payload_len: usize,
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Build the export document
pub fn capture_json(
    header: &TraceHeader,
    metadata: &SessionMetadata,
    records: &[PacketRecord],
    table: &OpcodeTable,
) -> CaptureJson {
    let packets = records
        .iter()
        .enumerate()
        .map(|(index, r)| PacketJson {
            index,
            timestamp: rfc3339(r.time()),
            elapsed_ns: r.elapsed_ns(header.session_start_ns),
            direction: r.direction,
            opcode: r.opcode(),
            opcode_name: table.name(r.opcode()).to_string(),
            payload_len: r.len(),
        })
        .collect();

    CaptureJson {
        header: HeaderJson {
            version: header.version,
            server_type: header.server_type,
            client_mode: header.client_mode,
            start_time: rfc3339(header.start_time()),
        },
        metadata: metadata.clone(),
        packets,
    }
}

/// Write the export document, pretty-printed, followed by a newline
pub fn export_json<W: Write>(
    header: &TraceHeader,
    metadata: &SessionMetadata,
    records: &[PacketRecord],
    table: &OpcodeTable,
    out: &mut W,
) -> Result<()> {
    let doc = capture_json(header, metadata, records, table);
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
