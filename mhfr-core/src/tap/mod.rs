//! Recording Tap
//!
//! [`RecordingConn`] wraps a live [`PacketConn`] and writes every packet that
//! crosses it into a capture, in both directions. To the code driving the
//! connection it behaves exactly like the wrapped connection.
//!
//! ```text
//!             recv_packet()                       send_packet(data)
//!   inner ─────────────────► record C→S ──► caller   record S→C ──► inner
//!                                 │                      │
//!                                 └──── Mutex<TraceWriter> ◄┘
//! ```
//!
//! - Received packets are recorded only after the inner receive succeeded.
//!   A failed receive propagates untouched and records nothing.
//! - Sent packets are recorded before they are handed to the inner
//!   connection. The inner send result is always returned as-is.
//! - A failed capture append is logged with `tracing::warn!` and counted in
//!   [`CaptureCounters`]. It never reaches the caller. The capture stops at
//!   the first failure; later packets are counted as failed.
//! - [`RecordingConn::finish`] always hands the connection back, even when
//!   closing the capture fails.
//!
//! One mutex serializes appends from both directions. The timestamp is taken
//! while that mutex is held, so file order and timestamp order always agree.
//!
//! # Example
//!
//! ```rust
//! use std::io;
//! use std::sync::Mutex;
//! use mhfr_core::tap::{PacketConn, RecordingConn};
//! use mhfr_core::trace::{ServerType, SessionMetadata, TraceHeader, TraceWriter};
//!
//! struct Loopback(Mutex<Vec<Vec<u8>>>);
//!
//! impl PacketConn for Loopback {
//!     fn recv_packet(&self) -> io::Result<Vec<u8>> {
//!         self.0.lock().unwrap().pop().ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
//!     }
//!     fn send_packet(&self, data: &[u8]) -> io::Result<()> {
//!         self.0.lock().unwrap().push(data.to_vec());
//!         Ok(())
//!     }
//! }
//!
//! let header = TraceHeader::new(ServerType::Channel, 40, 0);
//! let writer = TraceWriter::new(Vec::new(), header, &SessionMetadata::default()).unwrap();
//! let conn = RecordingConn::new(Loopback(Mutex::new(Vec::new())), writer);
//!
//! conn.send_packet(&[0x00, 0x12, 0x01]).unwrap();
//! assert_eq!(conn.recv_packet().unwrap(), vec![0x00, 0x12, 0x01]);
//! assert_eq!(conn.counters().recorded(), 2);
//!
//! let (_loopback, capture) = conn.finish();
//! assert!(capture.unwrap().len() > 32);
//! ```

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{CaptureError, Result};
use crate::trace::{opcode_of, Direction, TraceWriter};

/// A duplex connection that moves whole packets
///
/// Both calls block until a packet has been received or sent. Receive and
/// send may be driven from two different threads at the same time.
pub trait PacketConn: Send + Sync {
    /// Receive one packet from the peer
    fn recv_packet(&self) -> io::Result<Vec<u8>>;

    /// Send one packet to the peer
    fn send_packet(&self, data: &[u8]) -> io::Result<()>;
}

impl<T: PacketConn + ?Sized> PacketConn for Arc<T> {
    fn recv_packet(&self) -> io::Result<Vec<u8>> {
        (**self).recv_packet()
    }

    fn send_packet(&self, data: &[u8]) -> io::Result<()> {
        (**self).send_packet(data)
    }
}

impl<T: PacketConn + ?Sized> PacketConn for Box<T> {
    fn recv_packet(&self) -> io::Result<Vec<u8>> {
        (**self).recv_packet()
    }

    fn send_packet(&self, data: &[u8]) -> io::Result<()> {
        (**self).send_packet(data)
    }
}

/// Running totals kept by a [`RecordingConn`]
#[derive(Debug, Default)]
pub struct CaptureCounters {
    recorded: AtomicU64,
    excluded: AtomicU64,
    failed: AtomicU64,
}

impl CaptureCounters {
    /// Packets appended to the capture
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Packets skipped because their opcode is excluded
    pub fn excluded(&self) -> u64 {
        self.excluded.load(Ordering::Relaxed)
    }

    /// Packets whose append failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Capture-recording wrapper around a [`PacketConn`]
pub struct RecordingConn<C, W: Write, K = SystemClock> {
    inner: C,
    writer: Mutex<TraceWriter<W>>,
    exclude: HashSet<u16>,
    clock: K,
    counters: CaptureCounters,
}

impl<C, W: Write> RecordingConn<C, W, SystemClock> {
    /// Wrap `inner`, appending to `writer` with wall-clock timestamps
    pub fn new(inner: C, writer: TraceWriter<W>) -> Self {
        Self::with_clock(inner, writer, SystemClock)
    }
}

impl<C, W: Write, K: Clock> RecordingConn<C, W, K> {
    /// Wrap `inner` with a custom time source
    pub fn with_clock(inner: C, writer: TraceWriter<W>, clock: K) -> Self {
        tracing::debug!(
            server_type = %writer.header().server_type,
            "recording tap attached"
        );
        Self {
            inner,
            writer: Mutex::new(writer),
            exclude: HashSet::new(),
            clock,
            counters: CaptureCounters::default(),
        }
    }

    /// Skip packets with these opcodes
    pub fn with_excluded_opcodes<I: IntoIterator<Item = u16>>(mut self, opcodes: I) -> Self {
        self.exclude.extend(opcodes);
        self
    }

    /// The wrapped connection
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Running totals
    pub fn counters(&self) -> &CaptureCounters {
        &self.counters
    }

    /// Push buffered records to the sink
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| CaptureError::CaptureLocked)?;
        writer.flush()
    }

    /// Flush the capture and split the tap into the connection and the sink
    ///
    /// The connection comes back whether or not the capture closed cleanly.
    pub fn finish(self) -> (C, Result<W>) {
        tracing::debug!(
            recorded = self.counters.recorded(),
            excluded = self.counters.excluded(),
            failed = self.counters.failed(),
            "capture closed"
        );
        let sink = match self.writer.into_inner() {
            Ok(writer) => writer.into_inner(),
            Err(_) => Err(CaptureError::CaptureLocked),
        };
        (self.inner, sink)
    }

    fn record(&self, direction: Direction, data: &[u8]) {
        let opcode = opcode_of(data);
        if self.exclude.contains(&opcode) {
            self.counters.excluded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%direction, opcode, "capture writer lock poisoned, packet not recorded");
                return;
            }
        };

        let timestamp_ns = self.clock.now_ns();
        match writer.write_packet(timestamp_ns, direction, data) {
            Ok(()) => {
                self.counters.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(CaptureError::CaptureAborted) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%direction, opcode, "capture aborted, packet not recorded");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    %direction,
                    opcode,
                    len = data.len(),
                    error = %e,
                    "failed to record packet, capture stopped"
                );
            }
        }
    }
}

impl<C, W, K> PacketConn for RecordingConn<C, W, K>
where
    C: PacketConn,
    W: Write + Send,
    K: Clock,
{
    fn recv_packet(&self) -> io::Result<Vec<u8>> {
        let data = self.inner.recv_packet()?;
        self.record(Direction::ClientToServer, &data);
        Ok(data)
    }

    fn send_packet(&self, data: &[u8]) -> io::Result<()> {
        self.record(Direction::ServerToClient, data);
        self.inner.send_packet(data)
    }
}

impl<C, W: Write, K> std::fmt::Debug for RecordingConn<C, W, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingConn")
            .field("exclude", &self.exclude)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
