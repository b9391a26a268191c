//! Opcode mnemonic tables
//!
//! An [`OpcodeTable`] is built once (from the built-in list or a JSON file)
//! and handed to whatever renders packets. Lookups never fail: opcodes the
//! table doesn't know resolve to [`UNKNOWN_OPCODE`].
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": "zz-2024.1",
//!   "opcodes": [
//!     { "opcode": 18, "name": "MSG_SYS_ACK" },
//!     { "opcode": 19, "name": "MSG_SYS_TERMINAL_LOG" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};

/// Name reported for opcodes missing from a table
pub const UNKNOWN_OPCODE: &str = "UNKNOWN";

/// Version tag of the built-in table
pub const BUILTIN_VERSION: &str = "builtin-2";

const BUILTIN: &[(u16, &str)] = &[
    (0x0000, "MSG_HEAD"),
    (0x0008, "MSG_SYS_ADD_OBJECT"),
    (0x0009, "MSG_SYS_DEL_OBJECT"),
    (0x000A, "MSG_SYS_DISP_OBJECT"),
    (0x000B, "MSG_SYS_HIDE_OBJECT"),
    (0x0010, "MSG_SYS_END"),
    (0x0011, "MSG_SYS_NOP"),
    (0x0012, "MSG_SYS_ACK"),
    (0x0013, "MSG_SYS_TERMINAL_LOG"),
    (0x0014, "MSG_SYS_LOGIN"),
    (0x0015, "MSG_SYS_LOGOUT"),
    (0x0016, "MSG_SYS_SET_STATUS"),
    (0x0017, "MSG_SYS_PING"),
    (0x0018, "MSG_SYS_CAST_BINARY"),
    (0x0019, "MSG_SYS_HIDE_CLIENT"),
    (0x001A, "MSG_SYS_TIME"),
    (0x001B, "MSG_SYS_CASTED_BINARY"),
    (0x001C, "MSG_SYS_GET_FILE"),
    (0x001D, "MSG_SYS_ISSUE_LOGKEY"),
    (0x001E, "MSG_SYS_RECORD_LOG"),
    (0x001F, "MSG_SYS_ECHO"),
    (0x0020, "MSG_SYS_CREATE_STAGE"),
    (0x0021, "MSG_SYS_STAGE_DESTRUCT"),
    (0x0022, "MSG_SYS_ENTER_STAGE"),
    (0x0023, "MSG_SYS_BACK_STAGE"),
    (0x0024, "MSG_SYS_MOVE_STAGE"),
    (0x0025, "MSG_SYS_LEAVE_STAGE"),
    (0x0026, "MSG_SYS_LOCK_STAGE"),
    (0x0027, "MSG_SYS_UNLOCK_STAGE"),
    (0x0028, "MSG_SYS_RESERVE_STAGE"),
    (0x0029, "MSG_SYS_UNRESERVE_STAGE"),
    (0x002A, "MSG_SYS_SET_STAGE_PASS"),
    (0x002B, "MSG_SYS_WAIT_STAGE_BINARY"),
    (0x002C, "MSG_SYS_SET_STAGE_BINARY"),
    (0x002D, "MSG_SYS_GET_STAGE_BINARY"),
    (0x002E, "MSG_SYS_ENUMERATE_CLIENT"),
    (0x002F, "MSG_SYS_ENUMERATE_STAGE"),
    (0x0030, "MSG_SYS_CREATE_MUTEX"),
    (0x0031, "MSG_SYS_CREATE_OPEN_MUTEX"),
    (0x0032, "MSG_SYS_DELETE_MUTEX"),
    (0x0033, "MSG_SYS_OPEN_MUTEX"),
    (0x0034, "MSG_SYS_CLOSE_MUTEX"),
    (0x0035, "MSG_SYS_CREATE_SEMAPHORE"),
    (0x0036, "MSG_SYS_CREATE_ACQUIRE_SEMAPHORE"),
    (0x0037, "MSG_SYS_DELETE_SEMAPHORE"),
    (0x0038, "MSG_SYS_ACQUIRE_SEMAPHORE"),
    (0x0039, "MSG_SYS_RELEASE_SEMAPHORE"),
    (0x003A, "MSG_SYS_LOCK_GLOBAL_SEMA"),
    (0x003B, "MSG_SYS_UNLOCK_GLOBAL_SEMA"),
    (0x003C, "MSG_SYS_CHECK_SEMAPHORE"),
    (0x003D, "MSG_SYS_OPERATE_REGISTER"),
    (0x003E, "MSG_SYS_LOAD_REGISTER"),
    (0x003F, "MSG_SYS_NOTIFY_REGISTER"),
    (0x0040, "MSG_SYS_CREATE_OBJECT"),
    (0x0041, "MSG_SYS_DELETE_OBJECT"),
    (0x0042, "MSG_SYS_POSITION_OBJECT"),
    (0x0043, "MSG_SYS_ROTATE_OBJECT"),
    (0x0044, "MSG_SYS_DUPLICATE_OBJECT"),
    (0x0045, "MSG_SYS_SET_OBJECT_BINARY"),
    (0x0046, "MSG_SYS_GET_OBJECT_BINARY"),
    (0x0047, "MSG_SYS_GET_OBJECT_OWNER"),
    (0x0048, "MSG_SYS_UPDATE_OBJECT_BINARY"),
    (0x0049, "MSG_SYS_CLEANUP_OBJECT"),
    (0x004E, "MSG_SYS_INSERT_USER"),
    (0x004F, "MSG_SYS_DELETE_USER"),
    (0x0050, "MSG_SYS_SET_USER_BINARY"),
    (0x0051, "MSG_SYS_GET_USER_BINARY"),
    (0x0052, "MSG_SYS_NOTIFY_USER_BINARY"),
    (0x0058, "MSG_SYS_UPDATE_RIGHT"),
    (0x0059, "MSG_SYS_AUTH_QUERY"),
    (0x005A, "MSG_SYS_AUTH_DATA"),
    (0x005B, "MSG_SYS_AUTH_TERMINAL"),
    (0x005D, "MSG_SYS_RIGHTS_RELOAD"),
    (0x0060, "MSG_MHF_SAVEDATA"),
    (0x0061, "MSG_MHF_LOADDATA"),
];

/// One table entry in the JSON form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcodeEntry {
    pub opcode: u16,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpcodeFile {
    version: String,
    opcodes: Vec<OpcodeEntry>,
}

/// Immutable opcode → mnemonic mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeTable {
    version: String,
    names: BTreeMap<u16, String>,
}

impl OpcodeTable {
    /// The table shipped with this crate
    pub fn builtin() -> Self {
        Self::from_entries(
            BUILTIN_VERSION,
            BUILTIN.iter().map(|(op, name)| (*op, name.to_string())),
        )
    }

    /// A table with no entries; every lookup is [`UNKNOWN_OPCODE`]
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            names: BTreeMap::new(),
        }
    }

    /// Build a table from `(opcode, name)` pairs. Later duplicates win.
    pub fn from_entries<I>(version: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (u16, String)>,
    {
        Self {
            version: version.into(),
            names: entries.into_iter().collect(),
        }
    }

    /// Parse the JSON form
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: OpcodeFile = serde_json::from_str(json)?;
        if file.version.trim().is_empty() {
            return Err(CaptureError::InvalidConfig {
                reason: "opcode table version must not be empty".to_string(),
            });
        }
        Ok(Self::from_entries(
            file.version,
            file.opcodes.into_iter().map(|e| (e.opcode, e.name)),
        ))
    }

    /// Load the JSON form from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Render the JSON form
    pub fn to_json_string(&self) -> Result<String> {
        let file = OpcodeFile {
            version: self.version.clone(),
            opcodes: self
                .names
                .iter()
                .map(|(op, name)| OpcodeEntry {
                    opcode: *op,
                    name: name.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Mnemonic for `opcode`, or [`UNKNOWN_OPCODE`]
    pub fn name(&self, opcode: u16) -> &str {
        self.names
            .get(&opcode)
            .map(|s| s.as_str())
            .unwrap_or(UNKNOWN_OPCODE)
    }

    /// Whether the table has an entry for `opcode`
    pub fn contains(&self, opcode: u16) -> bool {
        self.names.contains_key(&opcode)
    }

    /// Table version tag
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of named opcodes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table names nothing
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
