//! Capture data model: header, session metadata and packet records

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::FORMAT_VERSION;

/// Which way a packet travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the game client, read by the server
    #[serde(rename = "C→S")]
    ClientToServer,
    /// Sent by the server to the game client
    #[serde(rename = "S→C")]
    ServerToClient,
}

impl Direction {
    /// Wire tag for this direction
    pub fn as_u8(&self) -> u8 {
        match self {
            Direction::ClientToServer => 0,
            Direction::ServerToClient => 1,
        }
    }

    /// Decode a wire tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Direction::ClientToServer),
            1 => Some(Direction::ServerToClient),
            _ => None,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToServer => "C→S",
            Direction::ServerToClient => "S→C",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of the server the capture was taken on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Sign,
    Entrance,
    Channel,
}

impl ServerType {
    /// Wire tag for this role
    pub fn as_u8(&self) -> u8 {
        match self {
            ServerType::Sign => 1,
            ServerType::Entrance => 2,
            ServerType::Channel => 3,
        }
    }

    /// Decode a wire tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ServerType::Sign),
            2 => Some(ServerType::Entrance),
            3 => Some(ServerType::Channel),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Sign => "sign",
            ServerType::Entrance => "entrance",
            ServerType::Channel => "channel",
        }
    }
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(ServerType::Sign),
            "entrance" => Ok(ServerType::Entrance),
            "channel" => Ok(ServerType::Channel),
            _ => Err(format!("unknown server type: {}", s)),
        }
    }
}

/// Fixed capture header, written once at the start of every file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    /// Container format version
    pub version: u16,

    /// Server role the session ran against
    pub server_type: ServerType,

    /// Client protocol version tag
    pub client_mode: u8,

    /// Session start in nanoseconds since the Unix epoch.
    /// All record timestamps share this time base.
    pub session_start_ns: i64,
}

impl TraceHeader {
    /// Create a header for the current format version
    pub fn new(server_type: ServerType, client_mode: u8, session_start_ns: i64) -> Self {
        Self {
            version: FORMAT_VERSION,
            server_type,
            client_mode,
            session_start_ns,
        }
    }

    /// Session start as a UTC timestamp
    pub fn start_time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.session_start_ns)
    }
}

/// Session details recorded right after the header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Host the server was listening on (may be empty)
    pub host: String,

    /// Port the server was listening on
    pub port: u16,

    /// Observed remote address of the client (may be empty)
    pub remote_addr: String,

    /// Character id, 0 when not yet known
    pub char_id: u32,

    /// User id, 0 when not yet known
    pub user_id: u32,
}

impl SessionMetadata {
    /// Metadata for a listener address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the remote address
    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self
    }

    /// Set character and user ids
    pub fn with_ids(mut self, char_id: u32, user_id: u32) -> Self {
        self.char_id = char_id;
        self.user_id = user_id;
        self
    }

    /// Character id, if one was recorded
    pub fn character(&self) -> Option<u32> {
        (self.char_id != 0).then_some(self.char_id)
    }

    /// User id, if one was recorded
    pub fn user(&self) -> Option<u32> {
        (self.user_id != 0).then_some(self.user_id)
    }
}

/// Opcode carried in the first two bytes of a packet, or 0 for shorter packets
pub fn opcode_of(data: &[u8]) -> u16 {
    match data {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

/// A single captured packet
///
/// The opcode is not stored separately; [`PacketRecord::opcode`] reads it
/// from the payload so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// Capture time in nanoseconds since the Unix epoch
    pub timestamp_ns: i64,

    /// Which way the packet travelled
    pub direction: Direction,

    /// Raw packet bytes, opcode prefix included
    pub payload: Vec<u8>,
}

impl PacketRecord {
    /// Create a new record
    pub fn new(timestamp_ns: i64, direction: Direction, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp_ns,
            direction,
            payload: payload.into(),
        }
    }

    /// Opcode of this packet
    pub fn opcode(&self) -> u16 {
        opcode_of(&self.payload)
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Nanoseconds since the given session start
    pub fn elapsed_ns(&self, session_start_ns: i64) -> i64 {
        self.timestamp_ns.saturating_sub(session_start_ns)
    }

    /// Capture time as a UTC timestamp
    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.timestamp_ns)
    }
}

/// Records travelling in one direction, in their original order
pub fn filter_by_direction(records: &[PacketRecord], direction: Direction) -> Vec<&PacketRecord> {
    records.iter().filter(|r| r.direction == direction).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_is_derived_from_payload() {
        let rec = PacketRecord::new(0, Direction::ServerToClient, vec![0x00, 0x12, 0xAA]);
        assert_eq!(rec.opcode(), 0x0012);

        let rec = PacketRecord::new(0, Direction::ServerToClient, vec![0xAB, 0xCD]);
        assert_eq!(rec.opcode(), 0xABCD);
    }

    #[test]
    fn test_short_payload_has_zero_opcode() {
        assert_eq!(PacketRecord::new(0, Direction::ClientToServer, vec![]).opcode(), 0);
        assert_eq!(PacketRecord::new(0, Direction::ClientToServer, vec![0x7F]).opcode(), 0);
    }

    #[test]
    fn test_direction_tags() {
        for dir in [Direction::ClientToServer, Direction::ServerToClient] {
            assert_eq!(Direction::from_u8(dir.as_u8()), Some(dir));
        }
        assert_eq!(Direction::from_u8(2), None);
        assert_eq!(Direction::ServerToClient.to_string(), "S→C");
    }

    #[test]
    fn test_server_type_names() {
        assert_eq!(ServerType::Channel.to_string(), "channel");
        assert_eq!("entrance".parse::<ServerType>().unwrap(), ServerType::Entrance);
        assert!("lobby".parse::<ServerType>().is_err());
        assert_eq!(ServerType::from_u8(0), None);
    }

    #[test]
    fn test_metadata_optional_ids() {
        let meta = SessionMetadata::new("127.0.0.1", 54001);
        assert_eq!(meta.character(), None);
        assert_eq!(meta.user(), None);

        let meta = meta.with_ids(42, 7);
        assert_eq!(meta.character(), Some(42));
        assert_eq!(meta.user(), Some(7));
    }

    #[test]
    fn test_filter_by_direction_preserves_order() {
        let records = vec![
            PacketRecord::new(1, Direction::ServerToClient, vec![0x00, 0x01]),
            PacketRecord::new(2, Direction::ClientToServer, vec![0x00, 0x02]),
            PacketRecord::new(3, Direction::ServerToClient, vec![0x00, 0x03]),
        ];
        let s2c = filter_by_direction(&records, Direction::ServerToClient);
        let opcodes: Vec<u16> = s2c.iter().map(|r| r.opcode()).collect();
        assert_eq!(opcodes, vec![0x0001, 0x0003]);
    }
}
