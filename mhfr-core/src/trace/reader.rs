//! Streaming capture reader
//!
//! Decoding is lazy and single pass: the header and metadata are parsed
//! on open, then one record is materialized per call. Running out of input
//! exactly on a record boundary is end-of-stream (`Ok(None)`); running out
//! anywhere else is a [`FormatError::Truncated`].

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{CaptureError, FormatError, Result};

use super::record::{opcode_of, Direction, PacketRecord, ServerType, SessionMetadata, TraceHeader};
use super::{FORMAT_VERSION, MAGIC, MAX_PAYLOAD_LEN};

/// Upper bound on the up-front payload allocation; larger payloads grow as bytes arrive.
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// Reads one capture file
#[derive(Debug)]
pub struct TraceReader<R: Read> {
    inner: BufReader<R>,
    header: TraceHeader,
    metadata: SessionMetadata,
    records_read: u64,
    failed: bool,
}

impl TraceReader<File> {
    /// Open a capture file on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read> TraceReader<R> {
    /// Parse and validate the header and metadata from `source`
    pub fn new(source: R) -> Result<Self> {
        let mut inner = BufReader::new(source);

        let magic: [u8; 4] = read_array(&mut inner, "header magic")?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic }.into());
        }

        let version = u16::from_be_bytes(read_array(&mut inner, "header version")?);
        if version == 0 || version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                version,
                max: FORMAT_VERSION,
            }
            .into());
        }

        let [server_tag, client_mode] = read_array::<2, _>(&mut inner, "header")?;
        let server_type = ServerType::from_u8(server_tag)
            .ok_or(FormatError::UnknownServerType { value: server_tag })?;
        let session_start_ns = i64::from_be_bytes(read_array(&mut inner, "header")?);

        let header = TraceHeader {
            version,
            server_type,
            client_mode,
            session_start_ns,
        };

        let host = read_string(&mut inner, "host")?;
        let port = u16::from_be_bytes(read_array(&mut inner, "metadata")?);
        let remote_addr = read_string(&mut inner, "remote_addr")?;
        let char_id = u32::from_be_bytes(read_array(&mut inner, "metadata")?);
        let user_id = u32::from_be_bytes(read_array(&mut inner, "metadata")?);

        let metadata = SessionMetadata {
            host,
            port,
            remote_addr,
            char_id,
            user_id,
        };

        Ok(Self {
            inner,
            header,
            metadata,
            records_read: 0,
            failed: false,
        })
    }

    /// The capture header
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// The session metadata
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Number of records decoded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Decode the next record, or `Ok(None)` at end of stream
    pub fn next_record(&mut self) -> Result<Option<PacketRecord>> {
        let index = self.records_read;

        let mut ts = [0u8; 8];
        match fill(&mut self.inner, &mut ts)? {
            0 => return Ok(None),
            8 => {}
            _ => return Err(FormatError::Truncated { section: "record timestamp" }.into()),
        }
        let timestamp_ns = i64::from_be_bytes(ts);

        let [dir_tag] = read_array::<1, _>(&mut self.inner, "record direction")?;
        let direction = Direction::from_u8(dir_tag).ok_or(FormatError::UnknownDirection {
            record: index,
            value: dir_tag,
        })?;

        let stored_opcode = u16::from_be_bytes(read_array(&mut self.inner, "record opcode")?);
        let len = u32::from_be_bytes(read_array(&mut self.inner, "record length")?);
        if len > MAX_PAYLOAD_LEN {
            return Err(FormatError::PayloadTooLarge {
                record: index,
                len,
                max: MAX_PAYLOAD_LEN,
            }
            .into());
        }

        let payload = read_bytes(&mut self.inner, len as usize, "record payload")?;

        let derived = opcode_of(&payload);
        if derived != stored_opcode {
            return Err(FormatError::OpcodeMismatch {
                record: index,
                stored: stored_opcode,
                derived,
            }
            .into());
        }

        self.records_read += 1;
        Ok(Some(PacketRecord {
            timestamp_ns,
            direction,
            payload,
        }))
    }

    /// Decode every remaining record
    pub fn read_all(mut self) -> Result<Vec<PacketRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Yields records until end of stream; stops after the first error.
impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<PacketRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode a whole capture file into its header, metadata and records
pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<(TraceHeader, SessionMetadata, Vec<PacketRecord>)> {
    let reader = TraceReader::open(path)?;
    let header = *reader.header();
    let metadata = reader.metadata().clone();
    let records = reader.read_all()?;
    Ok((header, metadata, records))
}

/// Read into `buf` until it is full or input ends; returns bytes read
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_array<const N: usize, R: Read>(r: &mut R, section: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            Err(FormatError::Truncated { section }.into())
        }
        Err(e) => Err(CaptureError::Io(e)),
    }
}

fn read_bytes<R: Read>(r: &mut R, len: usize, section: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(INITIAL_PAYLOAD_CAPACITY));
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(FormatError::Truncated { section }.into());
    }
    Ok(buf)
}

fn read_string<R: Read>(r: &mut R, field: &'static str) -> Result<String> {
    let len = u16::from_be_bytes(read_array(r, "metadata string length")?);
    let bytes = read_bytes(r, len as usize, "metadata string")?;
    String::from_utf8(bytes).map_err(|_| FormatError::InvalidString { field }.into())
}
