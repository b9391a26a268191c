//! Streaming capture writer
//!
//! The header and metadata go out (and are flushed) when the writer is
//! created. Records are buffered; call [`TraceWriter::flush`] or
//! [`TraceWriter::into_inner`] before treating the file as complete.
//!
//! Each record reaches the buffer as one frame. After a failed append the
//! writer refuses further records with [`CaptureError::CaptureAborted`], so a
//! torn record can only ever be the last thing in the file.

use std::io::{BufWriter, Write};

use crate::error::{CaptureError, FormatError, Result};

use super::record::{Direction, PacketRecord, SessionMetadata, TraceHeader};
use super::{FORMAT_VERSION, MAGIC, MAX_PAYLOAD_LEN};

/// Writes one capture file
pub struct TraceWriter<W: Write> {
    inner: BufWriter<W>,
    header: TraceHeader,
    records_written: u64,
    aborted: bool,
}

impl<W: Write> TraceWriter<W> {
    /// Write the header and metadata to `sink` and return a writer ready for records
    pub fn new(sink: W, header: TraceHeader, metadata: &SessionMetadata) -> Result<Self> {
        if header.version == 0 || header.version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                version: header.version,
                max: FORMAT_VERSION,
            }
            .into());
        }
        check_string("host", &metadata.host)?;
        check_string("remote_addr", &metadata.remote_addr)?;

        let mut inner = BufWriter::new(sink);

        inner.write_all(&MAGIC)?;
        inner.write_all(&header.version.to_be_bytes())?;
        inner.write_all(&[header.server_type.as_u8(), header.client_mode])?;
        inner.write_all(&header.session_start_ns.to_be_bytes())?;

        write_string(&mut inner, &metadata.host)?;
        inner.write_all(&metadata.port.to_be_bytes())?;
        write_string(&mut inner, &metadata.remote_addr)?;
        inner.write_all(&metadata.char_id.to_be_bytes())?;
        inner.write_all(&metadata.user_id.to_be_bytes())?;

        inner.flush()?;

        tracing::debug!(
            server_type = %header.server_type,
            client_mode = header.client_mode,
            "capture header written"
        );

        Ok(Self {
            inner,
            header,
            records_written: 0,
            aborted: false,
        })
    }

    /// Append one record
    pub fn write_record(&mut self, record: &PacketRecord) -> Result<()> {
        self.write_packet(record.timestamp_ns, record.direction, &record.payload)
    }

    /// Append one packet without building a [`PacketRecord`] first
    pub fn write_packet(&mut self, timestamp_ns: i64, direction: Direction, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LEN as usize {
            return Err(CaptureError::RecordTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN as usize,
            });
        }

        if self.aborted {
            return Err(CaptureError::CaptureAborted);
        }

        let mut frame = Vec::with_capacity(RECORD_PREFIX_LEN + payload.len());
        frame.extend_from_slice(&timestamp_ns.to_be_bytes());
        frame.push(direction.as_u8());
        frame.extend_from_slice(&super::record::opcode_of(payload).to_be_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);

        if let Err(e) = self.inner.write_all(&frame) {
            self.aborted = true;
            return Err(e.into());
        }
        self.records_written += 1;
        Ok(())
    }

    /// Whether an earlier append failed
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Push all buffered bytes to the sink
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// The header this file was opened with
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Number of records appended so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush and hand back the sink
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| CaptureError::Io(e.into_error()))
    }
}

impl<W: Write> std::fmt::Debug for TraceWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("header", &self.header)
            .field("records_written", &self.records_written)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

/// Timestamp, direction, opcode and payload length
const RECORD_PREFIX_LEN: usize = 15;

fn check_string(field: &'static str, value: &str) -> Result<()> {
    if value.len() > u16::MAX as usize {
        return Err(CaptureError::StringTooLong {
            field,
            len: value.len(),
        });
    }
    Ok(())
}

fn write_string<W: Write>(w: &mut W, value: &str) -> std::io::Result<()> {
    w.write_all(&(value.len() as u16).to_be_bytes())?;
    w.write_all(value.as_bytes())
}
