//! Replay against a live server
//!
//! Replaying means resending a capture's client→server records to a running
//! server and recording what comes back, so the result can be fed to the
//! [`Comparator`](crate::compare::Comparator) as the "actual" side.
//!
//! Only the preparation exists: arguments are validated and the stimulus is
//! extracted. How packets should be paced (original intervals scaled by
//! `speed`, or as fast as possible) is undecided, so [`replay`] stops there
//! with [`CaptureError::ReplayNotImplemented`].

use crate::config::ReplayConfig;
use crate::error::{CaptureError, Result};
use crate::trace::{filter_by_direction, Direction, PacketRecord};

/// Validated replay inputs
#[derive(Debug, Clone)]
pub struct ReplayPlan {
    /// `host:port` to connect to
    pub target: String,

    /// Pacing multiplier
    pub speed: f64,

    /// Client→server records in capture order
    pub stimulus: Vec<PacketRecord>,
}

impl ReplayPlan {
    /// Validate `config` and pick the stimulus out of `records`
    pub fn new(config: &ReplayConfig, records: &[PacketRecord]) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            target: config.target()?.to_string(),
            speed: config.speed,
            stimulus: filter_by_direction(records, Direction::ClientToServer)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Offset of each stimulus packet from the first one, as captured
    pub fn offsets_ns(&self) -> Vec<i64> {
        let Some(first) = self.stimulus.first() else {
            return Vec::new();
        };
        self.stimulus
            .iter()
            .map(|r| r.timestamp_ns.saturating_sub(first.timestamp_ns))
            .collect()
    }
}

/// Replay `records` against `config.target` and return the new capture's records
pub fn replay(config: &ReplayConfig, records: &[PacketRecord]) -> Result<Vec<PacketRecord>> {
    let plan = ReplayPlan::new(config, records)?;
    tracing::debug!(
        target_addr = %plan.target,
        speed = plan.speed,
        packets = plan.stimulus.len(),
        "replay requested"
    );
    Err(CaptureError::ReplayNotImplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<PacketRecord> {
        vec![
            PacketRecord::new(1_000, Direction::ClientToServer, vec![0x00, 0x14]),
            PacketRecord::new(1_100, Direction::ServerToClient, vec![0x00, 0x12]),
            PacketRecord::new(1_500, Direction::ClientToServer, vec![0x00, 0x17]),
        ]
    }

    #[test]
    fn test_missing_target() {
        let err = replay(&ReplayConfig::new(), &records()).unwrap_err();
        assert!(matches!(err, CaptureError::MissingArgument { name: "--target" }));
    }

    #[test]
    fn test_not_implemented_after_validation() {
        let config = ReplayConfig::new().with_target("127.0.0.1:54001");
        let err = replay(&config, &records()).unwrap_err();
        assert!(matches!(err, CaptureError::ReplayNotImplemented));
        assert_eq!(
            err.to_string(),
            "replay mode not yet implemented (requires live server connection)"
        );
    }

    #[test]
    fn test_plan_extracts_stimulus() {
        let config = ReplayConfig::new().with_target("127.0.0.1:54001").with_speed(2.0);
        let plan = ReplayPlan::new(&config, &records()).unwrap();
        assert_eq!(plan.target, "127.0.0.1:54001");
        assert_eq!(plan.stimulus.len(), 2);
        assert!(plan
            .stimulus
            .iter()
            .all(|r| r.direction == Direction::ClientToServer));
        assert_eq!(plan.offsets_ns(), vec![0, 500]);
    }
}
