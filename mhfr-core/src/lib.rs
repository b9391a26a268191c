//! # MHFR Core - packet capture for the game protocol
//!
//! MHFR records the packets a server exchanges with a game client, stores them
//! in a versioned binary container, and compares the responses of two servers
//! given the same client stimulus.
//!
//! - **Trace Codec** ([`trace`]): streaming encode/decode of the `.mhfr`
//!   container
//! - **Recording Tap** ([`tap`]): wraps a live connection and records both
//!   directions without changing its behavior
//! - **Comparator** ([`compare`]): positional diff of server→client responses
//! - **Inspection Surface** ([`inspect`]): dump, JSON export, stats, replay
//!   and diff views used by the `mhfr-replay` CLI
//!
//! ## Data flow
//!
//! ```text
//! live traffic ──► RecordingConn ──► TraceWriter ──► file
//! file ──► TraceReader ──► records ──► inspect / Comparator
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mhfr_core::{
//!     compare_packets, Direction, OpcodeTable, PacketRecord, ServerType, SessionMetadata,
//!     TraceHeader, TraceReader, TraceWriter,
//! };
//!
//! // Write a capture
//! let header = TraceHeader::new(ServerType::Channel, 40, 1_000);
//! let meta = SessionMetadata::new("127.0.0.1", 54001);
//! let mut writer = TraceWriter::new(Vec::new(), header, &meta).unwrap();
//! writer
//!     .write_record(&PacketRecord::new(1_500, Direction::ServerToClient, vec![0x00, 0x12, 0x01]))
//!     .unwrap();
//! let bytes = writer.into_inner().unwrap();
//!
//! // Read it back
//! let records = TraceReader::new(&bytes[..]).unwrap().read_all().unwrap();
//! assert_eq!(records[0].opcode(), 0x0012);
//!
//! // Compare against a server that answered with one extra byte
//! let actual = vec![PacketRecord::new(1_600, Direction::ServerToClient, vec![0x00, 0x12, 0x01, 0x02])];
//! let report = compare_packets(&records, &actual);
//! assert_eq!(
//!     report.render(&OpcodeTable::builtin()),
//!     vec!["#0: 0x0012 (MSG_SYS_ACK) size delta +1 bytes"]
//! );
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod inspect;
pub mod opcodes;
pub mod storage;
pub mod tap;
pub mod trace;

// Re-export main types
pub use compare::{compare_packets, Comparator, DiffKind, DiffReport, DiffSummary, PacketDiff};
pub use config::{CaptureConfig, CompareConfig, CompareMode, ReplayConfig};
pub use error::{CaptureError, ErrorCategory, ErrorDetail, ErrorResponse, FormatError, Result};
pub use inspect::{Mode, TraceStats};
pub use opcodes::{OpcodeTable, UNKNOWN_OPCODE};
pub use storage::{start_capture, CaptureStore, CapturedConn};
pub use tap::{CaptureCounters, Clock, ManualClock, PacketConn, RecordingConn, SystemClock};
pub use trace::{
    read_capture, Direction, PacketRecord, ServerType, SessionMetadata, TraceHeader, TraceReader,
    TraceWriter, FORMAT_VERSION,
};
