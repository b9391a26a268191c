//! MHFR/1: the packet capture container
//!
//! A capture is a fixed header, a session metadata block, then zero or more
//! packet records, ending at ordinary end of input. Everything is big-endian,
//! matching the game protocol itself.
//!
//! ## Layout
//!
//! ```text
//! header     magic "MHFR" | version:u16 | server_type:u8 | client_mode:u8 | session_start_ns:i64
//! metadata   host:(u16 len, utf8) | port:u16 | remote_addr:(u16 len, utf8) | char_id:u32 | user_id:u32
//! record*    timestamp_ns:i64 | direction:u8 | opcode:u16 | payload_len:u32 | payload
//! ```
//!
//! The record opcode duplicates the first two payload bytes. Readers check
//! that the two agree and reject the file otherwise.
//!
//! ## Magic
//!
//! The 4-byte `"MHFR"` magic is part of the MHFR/1 format: the version field
//! starts at offset 4, not 0. Files without it (a bare version-first header)
//! are not MHFR/1 captures and fail with `BAD_MAGIC`. Writers and readers of
//! this format must agree on the magic.
//!
//! ## Streaming
//!
//! ```text
//! TraceWriter::new() ──► header + metadata (flushed)
//! write_record()     ──► BufWriter ──► sink        flush() / into_inner()
//!
//! TraceReader::new() ◄── header + metadata (validated)
//! next_record()      ◄── one record at a time, Ok(None) at end of stream
//! ```

mod reader;
mod record;
mod writer;

pub use reader::{read_capture, TraceReader};
pub use record::{
    filter_by_direction, opcode_of, Direction, PacketRecord, ServerType, SessionMetadata,
    TraceHeader,
};
pub use writer::TraceWriter;

/// File magic
pub const MAGIC: [u8; 4] = *b"MHFR";

/// Highest container version this build reads and the version it writes
pub const FORMAT_VERSION: u16 = 1;

/// Largest payload a record may carry (16 MiB)
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Conventional file extension for captures
pub const FILE_EXTENSION: &str = "mhfr";

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random sequence so the round trip covers a spread
    /// of directions, opcodes and payload sizes including empty ones.
    fn generated_records(count: usize) -> Vec<PacketRecord> {
        let mut state: u32 = 0x1234_5678;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        (0..count)
            .map(|i| {
                let len = match i % 10 {
                    0 => 0,
                    1 => 1,
                    _ => (next() % 300) as usize,
                };
                let payload: Vec<u8> = (0..len).map(|_| next() as u8).collect();
                let direction = if next() % 2 == 0 {
                    Direction::ClientToServer
                } else {
                    Direction::ServerToClient
                };
                PacketRecord::new(1_000 + i as i64 * 17, direction, payload)
            })
            .collect()
    }

    #[test]
    fn test_generated_round_trip() {
        let header = TraceHeader::new(ServerType::Entrance, 40, 1_000);
        let meta = SessionMetadata::new("", 0);
        let records = generated_records(200);
        assert!(records.iter().any(|r| r.is_empty()));

        let mut writer = TraceWriter::new(Vec::new(), header, &meta).unwrap();
        for r in &records {
            writer.write_record(r).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let reader = TraceReader::new(&bytes[..]).unwrap();
        assert_eq!(*reader.header(), header);
        assert_eq!(*reader.metadata(), meta);

        let decoded = reader.read_all().unwrap();
        assert_eq!(decoded, records);
        for r in &decoded {
            let expected = if r.payload.len() >= 2 {
                u16::from_be_bytes([r.payload[0], r.payload[1]])
            } else {
                0
            };
            assert_eq!(r.opcode(), expected);
        }
    }
}
