//! Configuration for capture, comparison and replay

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};
use crate::trace::ServerType;

/// When and where live sessions are captured
///
/// ```json
/// {
///   "enabled": true,
///   "output_dir": "captures",
///   "exclude_opcodes": [17, 23],
///   "capture_channel": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Directory capture files are created in
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Opcodes that are never recorded (keep-alives and the like)
    #[serde(default)]
    pub exclude_opcodes: Vec<u16>,

    /// Capture sign server sessions
    #[serde(default = "default_true")]
    pub capture_sign: bool,

    /// Capture entrance server sessions
    #[serde(default = "default_true")]
    pub capture_entrance: bool,

    /// Capture channel server sessions
    #[serde(default = "default_true")]
    pub capture_channel: bool,
}

fn default_true() -> bool { true }
fn default_output_dir() -> PathBuf { PathBuf::from("captures") }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: default_output_dir(),
            exclude_opcodes: Vec::new(),
            capture_sign: true,
            capture_entrance: true,
            capture_channel: true,
        }
    }
}

impl CaptureConfig {
    /// Enabled config writing to `output_dir`
    pub fn enabled_in(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Whether a session on `server_type` should be captured
    pub fn should_capture(&self, server_type: ServerType) -> bool {
        self.enabled
            && match server_type {
                ServerType::Sign => self.capture_sign,
                ServerType::Entrance => self.capture_entrance,
                ServerType::Channel => self.capture_channel,
            }
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.output_dir.as_os_str().is_empty() {
            return Err(CaptureError::InvalidConfig {
                reason: "output_dir must not be empty when capture is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// How strictly response payloads are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Opcode and payload length must match
    #[default]
    Length,
    /// Opcode and every payload byte must match
    Exact,
}

impl CompareMode {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareMode::Length => "length",
            CompareMode::Exact => "exact",
        }
    }
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "length" => Ok(CompareMode::Length),
            "exact" => Ok(CompareMode::Exact),
            _ => Err(format!("unknown compare mode: {}", s)),
        }
    }
}

/// Comparator settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Payload comparison strictness
    #[serde(default)]
    pub mode: CompareMode,
}

impl CompareConfig {
    /// Byte-exact comparison
    pub fn exact() -> Self {
        Self {
            mode: CompareMode::Exact,
        }
    }
}

/// Settings for replaying a capture against a live server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// `host:port` of the server to replay against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Pacing multiplier; 1.0 is real time
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 { 1.0 }

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            target: None,
            speed: default_speed(),
        }
    }
}

impl ReplayConfig {
    /// Create with default pacing and no target
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target address
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the pacing multiplier
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Target address, or an error naming the missing flag
    pub fn target(&self) -> Result<&str> {
        match self.target.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(CaptureError::MissingArgument { name: "--target" }),
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.target()?;
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(CaptureError::InvalidConfig {
                reason: format!("speed must be a positive number, got {}", self.speed),
            });
        }
        Ok(())
    }
}
