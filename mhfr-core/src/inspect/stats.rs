//! Capture statistics

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::Serialize;

use crate::error::Result;
use crate::opcodes::OpcodeTable;
use crate::trace::{Direction, PacketRecord, ServerType, TraceReader};

use super::format_elapsed;

/// Packet and byte totals for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionTotals {
    pub packets: u64,
    pub bytes: u64,
}

/// Totals for one opcode across both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpcodeStats {
    pub opcode: u16,
    pub count: u64,
    pub bytes: u64,
}

/// Summary of a whole capture
///
/// Built incrementally with [`TraceStats::add`], so a capture of any size is
/// summarised without holding its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    pub server_type: ServerType,
    pub packets: u64,
    pub client_to_server: DirectionTotals,
    pub server_to_client: DirectionTotals,

    /// Last minus first record timestamp; `None` for an empty capture
    pub duration_ns: Option<i64>,

    #[serde(rename = "opcodes", serialize_with = "serialize_histogram")]
    by_opcode: HashMap<u16, (u64, u64)>,
    #[serde(skip)]
    first_ns: Option<i64>,
}

impl TraceStats {
    /// Empty statistics for a capture taken on `server_type`
    pub fn new(server_type: ServerType) -> Self {
        Self {
            server_type,
            packets: 0,
            client_to_server: DirectionTotals::default(),
            server_to_client: DirectionTotals::default(),
            duration_ns: None,
            by_opcode: HashMap::new(),
            first_ns: None,
        }
    }

    /// Account for one record
    pub fn add(&mut self, record: &PacketRecord) {
        let len = record.len() as u64;
        self.packets += 1;

        let totals = match record.direction {
            Direction::ClientToServer => &mut self.client_to_server,
            Direction::ServerToClient => &mut self.server_to_client,
        };
        totals.packets += 1;
        totals.bytes += len;

        let entry = self.by_opcode.entry(record.opcode()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += len;

        let first = *self.first_ns.get_or_insert(record.timestamp_ns);
        self.duration_ns = Some(record.timestamp_ns.saturating_sub(first));
    }

    /// Statistics over a record slice
    pub fn from_records(server_type: ServerType, records: &[PacketRecord]) -> Self {
        let mut stats = Self::new(server_type);
        for record in records {
            stats.add(record);
        }
        stats
    }

    /// Statistics over everything `reader` yields
    pub fn from_reader<R: Read>(mut reader: TraceReader<R>) -> Result<Self> {
        let mut stats = Self::new(reader.header().server_type);
        while let Some(record) = reader.next_record()? {
            stats.add(&record);
        }
        Ok(stats)
    }

    /// Whether no records were seen
    pub fn is_empty(&self) -> bool {
        self.packets == 0
    }

    /// Per-opcode totals, sorted by descending count with ties by ascending opcode
    pub fn opcodes(&self) -> Vec<OpcodeStats> {
        histogram(&self.by_opcode)
    }

    /// Total payload bytes in both directions
    pub fn total_bytes(&self) -> u64 {
        self.client_to_server.bytes + self.server_to_client.bytes
    }

    /// Write the human-readable report
    pub fn render<W: Write>(&self, label: &str, table: &OpcodeTable, out: &mut W) -> Result<()> {
        writeln!(out, "=== Capture Stats: {} ===", label)?;
        let duration = match self.duration_ns {
            Some(ns) => format_elapsed(ns),
            None => "-".to_string(),
        };
        writeln!(
            out,
            "Server: {}  Duration: {}  Packets: {}",
            self.server_type, duration, self.packets
        )?;
        writeln!(
            out,
            "C→S: {} packets ({} bytes)  S→C: {} packets ({} bytes)",
            self.client_to_server.packets,
            self.client_to_server.bytes,
            self.server_to_client.packets,
            self.server_to_client.bytes
        )?;
        writeln!(out)?;

        if self.is_empty() {
            writeln!(out, "Empty capture (0 packets)")?;
            out.flush()?;
            return Ok(());
        }

        writeln!(out, "{:<8} {:<35} {:>8} {:>10}", "Opcode", "Name", "Count", "Bytes")?;
        writeln!(out, "{:<8} {:<35} {:>8} {:>10}", "------", "----", "-----", "-----")?;
        for s in self.opcodes() {
            writeln!(
                out,
                "0x{:04X}   {:<35} {:>8} {:>10}",
                s.opcode,
                table.name(s.opcode),
                s.count,
                s.bytes
            )?;
        }
        out.flush()?;
        Ok(())
    }
}

fn histogram(by_opcode: &HashMap<u16, (u64, u64)>) -> Vec<OpcodeStats> {
    let mut opcodes: Vec<OpcodeStats> = by_opcode
        .iter()
        .map(|(&opcode, &(count, bytes))| OpcodeStats { opcode, count, bytes })
        .collect();
    opcodes.sort_by(|a, b| b.count.cmp(&a.count).then(a.opcode.cmp(&b.opcode)));
    opcodes
}

fn serialize_histogram<S: serde::Serializer>(
    by_opcode: &HashMap<u16, (u64, u64)>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(histogram(by_opcode))
}
