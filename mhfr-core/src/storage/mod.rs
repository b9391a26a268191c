//! Capture storage
//!
//! A [`CaptureStore`] is a directory of capture files. New captures get a
//! name derived from the session header:
//!
//! ```text
//! <role>_<YYYYmmdd_HHMMSS>_<nanos>.mhfr      e.g. channel_20240301_142501_000031337.mhfr
//! ```
//!
//! [`start_capture`] is the entry point for servers: given the capture
//! configuration and a freshly accepted connection, it returns a
//! [`CapturedConn`] that records the session if capture is enabled for that
//! server role, and passes traffic straight through otherwise.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::CaptureConfig;
use crate::error::Result;
use crate::tap::{PacketConn, RecordingConn};
use crate::trace::{SessionMetadata, TraceHeader, TraceReader, TraceWriter, FILE_EXTENSION};

/// Directory holding capture files
#[derive(Debug, Clone)]
pub struct CaptureStore {
    directory: PathBuf,
}

impl CaptureStore {
    /// Open a store, creating the directory if needed
    pub fn new<P: Into<PathBuf>>(directory: P) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Store directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name a capture with this header is created under
    pub fn file_name(header: &TraceHeader) -> String {
        let start = header.start_time();
        format!(
            "{}_{}_{:09}.{}",
            header.server_type,
            start.format("%Y%m%d_%H%M%S"),
            start.timestamp_subsec_nanos(),
            FILE_EXTENSION
        )
    }

    /// Create a new capture file and write its header
    ///
    /// Never overwrites: if the name is taken a numeric suffix is added.
    pub fn create(&self, header: TraceHeader, metadata: &SessionMetadata) -> Result<(PathBuf, TraceWriter<File>)> {
        let base = Self::file_name(&header);
        let mut path = self.directory.join(&base);
        let mut attempt = 0u32;

        let file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt += 1;
                    let stem = base.trim_end_matches(&format!(".{}", FILE_EXTENSION));
                    path = self
                        .directory
                        .join(format!("{}_{}.{}", stem, attempt, FILE_EXTENSION));
                }
                Err(e) => return Err(e.into()),
            }
        };

        let writer = TraceWriter::new(file, header, metadata)?;
        tracing::info!(path = %path.display(), server_type = %header.server_type, "capture started");
        Ok((path, writer))
    }

    /// Capture files in the store, sorted by name
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut captures = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
                captures.push(path);
            }
        }
        captures.sort();
        Ok(captures)
    }

    /// Open a capture for reading. Relative paths resolve against the store.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<TraceReader<File>> {
        let path = path.as_ref();
        if path.is_absolute() {
            TraceReader::open(path)
        } else {
            TraceReader::open(self.directory.join(path))
        }
    }
}

/// A connection that may or may not be recorded
#[derive(Debug)]
pub enum CapturedConn<C> {
    /// Traffic is recorded to `path`
    Recording {
        conn: RecordingConn<C, File>,
        path: PathBuf,
    },
    /// Capture is off for this session
    Passthrough(C),
}

impl<C> CapturedConn<C> {
    /// Whether packets are being recorded
    pub fn is_recording(&self) -> bool {
        matches!(self, CapturedConn::Recording { .. })
    }

    /// Capture file, if recording
    pub fn path(&self) -> Option<&Path> {
        match self {
            CapturedConn::Recording { path, .. } => Some(path),
            CapturedConn::Passthrough(_) => None,
        }
    }

    /// Close the capture (if any) and hand back the connection
    ///
    /// The connection is returned even when the capture could not be closed.
    pub fn finish(self) -> (C, Result<()>) {
        match self {
            CapturedConn::Recording { conn, path } => {
                let (inner, file) = conn.finish();
                let closed = file.and_then(|file| Ok(file.sync_all()?));
                match &closed {
                    Ok(()) => tracing::info!(path = %path.display(), "capture finished"),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "capture not closed cleanly"),
                }
                (inner, closed)
            }
            CapturedConn::Passthrough(conn) => (conn, Ok(())),
        }
    }
}

impl<C: PacketConn> PacketConn for CapturedConn<C> {
    fn recv_packet(&self) -> io::Result<Vec<u8>> {
        match self {
            CapturedConn::Recording { conn, .. } => conn.recv_packet(),
            CapturedConn::Passthrough(conn) => conn.recv_packet(),
        }
    }

    fn send_packet(&self, data: &[u8]) -> io::Result<()> {
        match self {
            CapturedConn::Recording { conn, .. } => conn.send_packet(data),
            CapturedConn::Passthrough(conn) => conn.send_packet(data),
        }
    }
}

/// Wrap `conn` in a recording tap if `config` asks for it
///
/// A capture file that cannot be created is logged and the session goes
/// ahead unrecorded.
pub fn start_capture<C: PacketConn>(
    config: &CaptureConfig,
    conn: C,
    header: TraceHeader,
    metadata: &SessionMetadata,
) -> CapturedConn<C> {
    if !config.should_capture(header.server_type) {
        return CapturedConn::Passthrough(conn);
    }

    let created = CaptureStore::new(&config.output_dir).and_then(|store| store.create(header, metadata));
    match created {
        Ok((path, writer)) => CapturedConn::Recording {
            conn: RecordingConn::new(conn, writer)
                .with_excluded_opcodes(config.exclude_opcodes.iter().copied()),
            path,
        },
        Err(e) => {
            tracing::warn!(
                dir = %config.output_dir.display(),
                error = %e,
                "could not start capture, continuing without it"
            );
            CapturedConn::Passthrough(conn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ServerType;
    use std::sync::Mutex;

    /// 2024-03-01T14:25:01.000031337Z
    const START_NS: i64 = 1_709_303_101_000_031_337;

    struct EchoConn(Mutex<Vec<Vec<u8>>>);

    impl PacketConn for EchoConn {
        fn recv_packet(&self) -> io::Result<Vec<u8>> {
            self.0
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
        }

        fn send_packet(&self, data: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().push(data.to_vec());
            Ok(())
        }
    }

    fn echo() -> EchoConn {
        EchoConn(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_file_name() {
        let header = TraceHeader::new(ServerType::Channel, 40, START_NS);
        assert_eq!(
            CaptureStore::file_name(&header),
            "channel_20240301_142501_000031337.mhfr"
        );
    }

    #[test]
    fn test_create_list_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new(dir.path().join("captures")).unwrap();
        let header = TraceHeader::new(ServerType::Sign, 40, START_NS);
        let meta = SessionMetadata::new("127.0.0.1", 53312).with_ids(5, 6);

        let (first, writer) = store.create(header, &meta).unwrap();
        writer.into_inner().unwrap();
        let (second, writer) = store.create(header, &meta).unwrap();
        writer.into_inner().unwrap();

        assert_ne!(first, second);
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "sign_20240301_142501_000031337_1.mhfr"
        );

        std::fs::write(store.directory().join("notes.txt"), "x").unwrap();
        assert_eq!(store.list().unwrap(), vec![first.clone(), second]);

        let name = first.file_name().unwrap();
        let reader = store.open(name).unwrap();
        assert_eq!(*reader.header(), header);
        assert_eq!(*reader.metadata(), meta);
    }

    #[test]
    fn test_start_capture_disabled_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CaptureConfig::enabled_in(dir.path());
        config.capture_channel = false;

        let header = TraceHeader::new(ServerType::Channel, 40, START_NS);
        let conn = start_capture(&config, echo(), header, &SessionMetadata::default());
        assert!(!conn.is_recording());
        conn.send_packet(&[0x00, 0x12]).unwrap();
        assert_eq!(conn.recv_packet().unwrap(), vec![0x00, 0x12]);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        let (echo, closed) = conn.finish();
        assert!(closed.is_ok());
        assert!(echo.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_capture_records_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CaptureConfig::enabled_in(dir.path());
        config.exclude_opcodes = vec![0x0011];

        let header = TraceHeader::new(ServerType::Entrance, 40, START_NS);
        let conn = start_capture(&config, echo(), header, &SessionMetadata::default());
        assert!(conn.is_recording());
        let path = conn.path().unwrap().to_path_buf();

        conn.send_packet(&[0x00, 0x11]).unwrap();
        conn.send_packet(&[0x00, 0x12, 0x01]).unwrap();
        conn.recv_packet().unwrap();
        let (echo, closed) = conn.finish();
        closed.unwrap();
        assert_eq!(echo.0.lock().unwrap().len(), 1);

        let (read_header, _, records) = crate::trace::read_capture(&path).unwrap();
        assert_eq!(read_header.server_type, ServerType::Entrance);
        let opcodes: Vec<u16> = records.iter().map(|r| r.opcode()).collect();
        assert_eq!(opcodes, vec![0x0012, 0x0012]);
    }

    #[test]
    fn test_start_capture_survives_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let config = CaptureConfig::enabled_in(blocker.join("captures"));
        let header = TraceHeader::new(ServerType::Sign, 40, START_NS);
        let conn = start_capture(&config, echo(), header, &SessionMetadata::default());
        assert!(!conn.is_recording());
        conn.send_packet(&[0x00, 0x17]).unwrap();
    }
}
