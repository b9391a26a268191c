//! Error types for MHFR operations
//!
//! Errors fall into three families that callers need to tell apart:
//!
//! - **I/O errors**: the sink or source is unavailable. Fatal to the current
//!   call and never retried internally.
//! - **Format errors**: the input is not a valid capture (bad magic, bad
//!   version, truncated or implausible record). Carried by [`FormatError`] so
//!   that "not a capture" is never confused with "storage problem".
//! - **Capture faults**: failures inside the recording tap. These never reach
//!   the caller of a live connection; see [`crate::tap`].
//!
//! Every variant has a stable error code (e.g. `UNSUPPORTED_VERSION`) and an
//! [`ErrorCategory`] for grouping.
//!
//! # Example
//!
//! ```rust
//! use mhfr_core::error::{CaptureError, ErrorCategory, FormatError};
//!
//! let err = CaptureError::from(FormatError::UnsupportedVersion { version: 9, max: 1 });
//! assert!(err.is_format_error());
//! assert_eq!(err.category(), ErrorCategory::Format);
//! assert_eq!(err.error_code(), "UNSUPPORTED_VERSION");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for MHFR operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Sink or source unavailable
    Io,
    /// Input is not a valid capture
    Format,
    /// A value cannot be represented in the container format
    Validation,
    /// Configuration or command-line input is wrong
    Config,
    /// Requested functionality does not exist
    Unsupported,
    /// Internal error that shouldn't happen
    Internal,
}

/// Structural problems found while decoding a capture.
///
/// Decoding aborts at the first one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The file does not start with the container magic
    #[error("bad magic {found:02X?}; this is not an MHFR capture")]
    BadMagic { found: [u8; 4] },

    /// The header carries a version this build cannot read
    #[error("unsupported format version {version} (supported: 1..={max})")]
    UnsupportedVersion { version: u16, max: u16 },

    /// The server role byte is not one of the known roles
    #[error("unknown server type {value}")]
    UnknownServerType { value: u8 },

    /// A record's direction byte is neither 0 nor 1
    #[error("record {record}: unknown direction {value}")]
    UnknownDirection { record: u64, value: u8 },

    /// Input ended in the middle of a structure
    #[error("truncated {section}")]
    Truncated { section: &'static str },

    /// A length prefix exceeds what a capture may legitimately contain
    #[error("record {record}: payload length {len} exceeds limit {max}")]
    PayloadTooLarge { record: u64, len: u32, max: u32 },

    /// The stored opcode disagrees with the payload's first two bytes
    #[error("record {record}: stored opcode 0x{stored:04X} does not match payload opcode 0x{derived:04X}")]
    OpcodeMismatch { record: u64, stored: u16, derived: u16 },

    /// A metadata string is not valid UTF-8
    #[error("metadata field '{field}' is not valid UTF-8")]
    InvalidString { field: &'static str },
}

impl FormatError {
    /// Returns the stable error code for this format error
    pub fn error_code(&self) -> &'static str {
        match self {
            FormatError::BadMagic { .. } => "BAD_MAGIC",
            FormatError::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            FormatError::UnknownServerType { .. } => "UNKNOWN_SERVER_TYPE",
            FormatError::UnknownDirection { .. } => "UNKNOWN_DIRECTION",
            FormatError::Truncated { .. } => "TRUNCATED",
            FormatError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            FormatError::OpcodeMismatch { .. } => "OPCODE_MISMATCH",
            FormatError::InvalidString { .. } => "INVALID_STRING",
        }
    }
}

/// Errors that can occur in MHFR operations
#[derive(Error, Debug)]
pub enum CaptureError {
    // ═══════════════════════════════════════════════════════════════════════
    // Codec errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The underlying sink or source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a valid capture
    #[error("invalid capture: {0}")]
    Format(#[from] FormatError),

    /// A payload is too large to be written into a capture
    #[error("payload of {len} bytes exceeds the {max} byte record limit")]
    RecordTooLarge { len: usize, max: usize },

    /// A metadata string is too long for its u16 length prefix
    #[error("metadata field '{field}' is {len} bytes; the limit is 65535")]
    StringTooLong { field: &'static str, len: usize },

    /// An earlier append failed, so the writer takes no more records
    #[error("capture aborted after a failed write")]
    CaptureAborted,

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration and command-line errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of range or inconsistent
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A required argument was not supplied
    #[error("{name} is required")]
    MissingArgument { name: &'static str },

    /// The inspection mode name is not recognised
    #[error("unknown mode: {mode}")]
    UnknownMode { mode: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Unsupported and internal
    // ═══════════════════════════════════════════════════════════════════════

    /// Replay against a live server has no implementation
    #[error("replay mode not yet implemented (requires live server connection)")]
    ReplayNotImplemented,

    /// The capture writer lock is poisoned (a panic occurred while holding it)
    #[error("capture writer lock poisoned. This is a bug; please report it.")]
    CaptureLocked,
}

impl CaptureError {
    /// Returns true if the input was rejected as a malformed capture
    pub fn is_format_error(&self) -> bool {
        matches!(self, CaptureError::Format(_))
    }

    /// Returns true if the sink or source itself failed
    pub fn is_io_error(&self) -> bool {
        matches!(self, CaptureError::Io(_))
    }

    /// Returns the format error, if this is one
    pub fn as_format_error(&self) -> Option<&FormatError> {
        match self {
            CaptureError::Format(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::Io(_) | CaptureError::CaptureAborted => ErrorCategory::Io,

            CaptureError::Format(_) => ErrorCategory::Format,

            CaptureError::RecordTooLarge { .. }
            | CaptureError::StringTooLong { .. } => ErrorCategory::Validation,

            CaptureError::Json(_)
            | CaptureError::InvalidConfig { .. }
            | CaptureError::MissingArgument { .. }
            | CaptureError::UnknownMode { .. } => ErrorCategory::Config,

            CaptureError::ReplayNotImplemented => ErrorCategory::Unsupported,

            CaptureError::CaptureLocked => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    ///
    /// Format errors report the code of the nested [`FormatError`].
    pub fn error_code(&self) -> &'static str {
        match self {
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Format(e) => e.error_code(),
            CaptureError::RecordTooLarge { .. } => "RECORD_TOO_LARGE",
            CaptureError::StringTooLong { .. } => "STRING_TOO_LONG",
            CaptureError::CaptureAborted => "CAPTURE_ABORTED",
            CaptureError::Json(_) => "JSON_ERROR",
            CaptureError::InvalidConfig { .. } => "INVALID_CONFIG",
            CaptureError::MissingArgument { .. } => "MISSING_ARGUMENT",
            CaptureError::UnknownMode { .. } => "UNKNOWN_MODE",
            CaptureError::ReplayNotImplemented => "REPLAY_NOT_IMPLEMENTED",
            CaptureError::CaptureLocked => "CAPTURE_LOCKED",
        }
    }

    /// Converts this error to a JSON-serializable response object
    ///
    /// ```json
    /// {
    ///   "error": {
    ///     "code": "TRUNCATED",
    ///     "message": "invalid capture: truncated record payload",
    ///     "category": "format"
    ///   }
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
            },
        }
    }
}

/// JSON-serializable error response for tool integrations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "UNSUPPORTED_VERSION")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors_are_distinct_from_io() {
        let format: CaptureError = FormatError::Truncated { section: "header" }.into();
        assert!(format.is_format_error());
        assert!(!format.is_io_error());

        let io: CaptureError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(io.is_io_error());
        assert!(!io.is_format_error());
        assert!(io.as_format_error().is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CaptureError::from(FormatError::BadMagic { found: *b"PK\x03\x04" }).error_code(),
            "BAD_MAGIC"
        );
        assert_eq!(CaptureError::ReplayNotImplemented.error_code(), "REPLAY_NOT_IMPLEMENTED");
        assert_eq!(
            CaptureError::UnknownMode { mode: "x".to_string() }.error_code(),
            "UNKNOWN_MODE"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CaptureError::RecordTooLarge { len: 1, max: 0 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            CaptureError::MissingArgument { name: "--capture" }.category(),
            ErrorCategory::Config
        );
        assert_eq!(CaptureError::CaptureLocked.category(), ErrorCategory::Internal);
        assert_eq!(CaptureError::CaptureAborted.category(), ErrorCategory::Io);
        assert_eq!(CaptureError::CaptureAborted.error_code(), "CAPTURE_ABORTED");
    }

    #[test]
    fn test_error_response_serialization() {
        let err = CaptureError::from(FormatError::UnsupportedVersion { version: 7, max: 1 });
        let response = err.to_error_response();

        let json = serde_json::to_string_pretty(&response).unwrap();
        assert!(json.contains("UNSUPPORTED_VERSION"));
        assert!(json.contains("\"format\""));

        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error.category, ErrorCategory::Format);
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = CaptureError::from(FormatError::OpcodeMismatch {
            record: 3,
            stored: 0x12,
            derived: 0x13,
        });
        let msg = err.to_string();
        assert!(msg.contains("record 3"));
        assert!(msg.contains("0x0012"));
        assert!(msg.contains("0x0013"));
    }
}
