//! Response drift detection
//!
//! The [`Comparator`] lines up the server→client records of a reference
//! ("expected") capture against those of an observed ("actual") capture and
//! reports where they disagree. Client→server records are the stimulus and
//! are never compared; they don't take part in indexing either.
//!
//! Records are paired by position:
//!
//! | expected[i] vs actual[i]             | result                     |
//! |--------------------------------------|----------------------------|
//! | no actual[i]                         | [`DiffKind::MissingResponse`] |
//! | opcodes differ                       | [`DiffKind::OpcodeMismatch`]  |
//! | same opcode, lengths differ          | [`DiffKind::SizeDelta`]       |
//! | same opcode and length, bytes differ | [`DiffKind::PayloadMismatch`] (exact mode only) |
//! | actual beyond the end of expected    | [`DiffKind::UnexpectedExtra`] |
//!
//! In the default [`CompareMode::Length`] mode payload bytes are not
//! inspected at all.

use serde::Serialize;

use crate::config::{CompareConfig, CompareMode};
use crate::opcodes::OpcodeTable;
use crate::trace::{filter_by_direction, Direction, PacketRecord};

/// What kind of discrepancy a [`PacketDiff`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffKind {
    /// The actual capture has no response at this position
    MissingResponse,
    /// Both sides responded with different opcodes
    OpcodeMismatch,
    /// Same opcode, payload length differs by `actual - expected` bytes
    SizeDelta { delta: i64 },
    /// Same opcode and length, payloads first differ at `offset`
    PayloadMismatch { offset: usize },
    /// The actual capture has a response past the end of the expected one
    UnexpectedExtra,
}

/// One discrepancy between expected and actual responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketDiff {
    /// Position among the server→client records
    pub index: usize,

    /// What differs
    pub kind: DiffKind,

    /// Expected record, absent for [`DiffKind::UnexpectedExtra`]
    pub expected: Option<PacketRecord>,

    /// Actual record, absent for [`DiffKind::MissingResponse`]
    pub actual: Option<PacketRecord>,
}

impl PacketDiff {
    /// Adapter that renders this diff as one line using `table` for names
    pub fn display<'a>(&'a self, table: &'a OpcodeTable) -> DiffDisplay<'a> {
        DiffDisplay { diff: self, table }
    }

    /// One-line description
    pub fn render(&self, table: &OpcodeTable) -> String {
        self.display(table).to_string()
    }
}

/// See [`PacketDiff::display`]
pub struct DiffDisplay<'a> {
    diff: &'a PacketDiff,
    table: &'a OpcodeTable,
}

impl DiffDisplay<'_> {
    fn op(&self, record: Option<&PacketRecord>) -> (u16, &str) {
        let opcode = record.map(|r| r.opcode()).unwrap_or(0);
        (opcode, self.table.name(opcode))
    }
}

impl std::fmt::Display for DiffDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.diff;
        let (exp_op, exp_name) = self.op(d.expected.as_ref());
        let (act_op, act_name) = self.op(d.actual.as_ref());

        match d.kind {
            DiffKind::MissingResponse => write!(
                f,
                "#{}: expected 0x{:04X} ({}), got no response",
                d.index, exp_op, exp_name
            ),
            DiffKind::OpcodeMismatch => write!(
                f,
                "#{}: opcode mismatch: expected 0x{:04X} ({}), got 0x{:04X} ({})",
                d.index, exp_op, exp_name, act_op, act_name
            ),
            DiffKind::SizeDelta { delta } => write!(
                f,
                "#{}: 0x{:04X} ({}) size delta {:+} bytes",
                d.index, exp_op, exp_name, delta
            ),
            DiffKind::PayloadMismatch { offset } => write!(
                f,
                "#{}: 0x{:04X} ({}) payload differs at byte {}",
                d.index, exp_op, exp_name, offset
            ),
            DiffKind::UnexpectedExtra => write!(
                f,
                "#{}: unexpected extra response 0x{:04X} ({})",
                d.index, act_op, act_name
            ),
        }
    }
}

/// Totals for a [`DiffReport`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Server→client records in the expected capture
    pub expected_responses: usize,
    /// Server→client records in the actual capture
    pub actual_responses: usize,
    pub missing: usize,
    pub opcode_mismatches: usize,
    pub size_deltas: usize,
    pub payload_mismatches: usize,
    pub unexpected_extra: usize,
    /// Index of the first diff, if any
    pub divergence_point: Option<usize>,
}

/// Ordered result of a comparison
///
/// Positional diffs come first in ascending index order, followed by the
/// trailing extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    diffs: Vec<PacketDiff>,
    expected_responses: usize,
    actual_responses: usize,
}

impl DiffReport {
    /// Whether no diffs were found
    pub fn is_identical(&self) -> bool {
        self.diffs.is_empty()
    }

    /// All diffs in report order
    pub fn diffs(&self) -> &[PacketDiff] {
        &self.diffs
    }

    /// Number of diffs
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Same as [`DiffReport::is_identical`]
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Iterate over diffs
    pub fn iter(&self) -> std::slice::Iter<'_, PacketDiff> {
        self.diffs.iter()
    }

    /// Counts by kind
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary {
            expected_responses: self.expected_responses,
            actual_responses: self.actual_responses,
            divergence_point: self.diffs.iter().map(|d| d.index).min(),
            ..Default::default()
        };
        for diff in &self.diffs {
            match diff.kind {
                DiffKind::MissingResponse => summary.missing += 1,
                DiffKind::OpcodeMismatch => summary.opcode_mismatches += 1,
                DiffKind::SizeDelta { .. } => summary.size_deltas += 1,
                DiffKind::PayloadMismatch { .. } => summary.payload_mismatches += 1,
                DiffKind::UnexpectedExtra => summary.unexpected_extra += 1,
            }
        }
        summary
    }

    /// One rendered line per diff
    pub fn render(&self, table: &OpcodeTable) -> Vec<String> {
        self.diffs.iter().map(|d| d.render(table)).collect()
    }

    /// Take the diffs
    pub fn into_diffs(self) -> Vec<PacketDiff> {
        self.diffs
    }
}

impl IntoIterator for DiffReport {
    type Item = PacketDiff;
    type IntoIter = std::vec::IntoIter<PacketDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiffReport {
    type Item = &'a PacketDiff;
    type IntoIter = std::slice::Iter<'a, PacketDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.iter()
    }
}

/// Positional comparator for response sequences
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    config: CompareConfig,
}

impl Comparator {
    /// Comparator with the given settings
    pub fn new(config: CompareConfig) -> Self {
        Self { config }
    }

    /// Comparison mode in use
    pub fn mode(&self) -> CompareMode {
        self.config.mode
    }

    /// Compare the server→client records of `expected` and `actual`
    pub fn compare(&self, expected: &[PacketRecord], actual: &[PacketRecord]) -> DiffReport {
        let expected = filter_by_direction(expected, Direction::ServerToClient);
        let actual = filter_by_direction(actual, Direction::ServerToClient);

        let mut diffs = Vec::new();

        for (index, exp) in expected.iter().enumerate() {
            let Some(act) = actual.get(index) else {
                diffs.push(PacketDiff {
                    index,
                    kind: DiffKind::MissingResponse,
                    expected: Some((*exp).clone()),
                    actual: None,
                });
                continue;
            };

            if let Some(kind) = self.classify(exp, act) {
                diffs.push(PacketDiff {
                    index,
                    kind,
                    expected: Some((*exp).clone()),
                    actual: Some((*act).clone()),
                });
            }
        }

        for (index, act) in actual.iter().enumerate().skip(expected.len()) {
            diffs.push(PacketDiff {
                index,
                kind: DiffKind::UnexpectedExtra,
                expected: None,
                actual: Some((*act).clone()),
            });
        }

        tracing::debug!(
            expected = expected.len(),
            actual = actual.len(),
            diffs = diffs.len(),
            mode = %self.config.mode,
            "compared responses"
        );

        DiffReport {
            diffs,
            expected_responses: expected.len(),
            actual_responses: actual.len(),
        }
    }

    fn classify(&self, expected: &PacketRecord, actual: &PacketRecord) -> Option<DiffKind> {
        if expected.opcode() != actual.opcode() {
            return Some(DiffKind::OpcodeMismatch);
        }
        if expected.len() != actual.len() {
            return Some(DiffKind::SizeDelta {
                delta: actual.len() as i64 - expected.len() as i64,
            });
        }
        match self.config.mode {
            CompareMode::Length => None,
            CompareMode::Exact => expected
                .payload
                .iter()
                .zip(&actual.payload)
                .position(|(a, b)| a != b)
                .map(|offset| DiffKind::PayloadMismatch { offset }),
        }
    }
}

/// Compare with the default length-only granularity
pub fn compare_packets(expected: &[PacketRecord], actual: &[PacketRecord]) -> DiffReport {
    Comparator::default().compare(expected, actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s2c(opcode: u16, len: usize) -> PacketRecord {
        let mut payload = opcode.to_be_bytes().to_vec();
        payload.resize(len.max(2), 0xAB);
        PacketRecord::new(0, Direction::ServerToClient, payload)
    }

    fn c2s(opcode: u16) -> PacketRecord {
        PacketRecord::new(0, Direction::ClientToServer, opcode.to_be_bytes().to_vec())
    }

    #[test]
    fn test_size_delta() {
        let report = compare_packets(&[s2c(0x0012, 3)], &[s2c(0x0012, 4)]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.diffs()[0].index, 0);
        assert_eq!(report.diffs()[0].kind, DiffKind::SizeDelta { delta: 1 });

        let report = compare_packets(&[s2c(0x0012, 10)], &[s2c(0x0012, 4)]);
        assert_eq!(report.diffs()[0].kind, DiffKind::SizeDelta { delta: -6 });
    }

    #[test]
    fn test_mismatch_then_missing() {
        let report = compare_packets(&[s2c(0x0012, 2), s2c(0x0061, 2)], &[s2c(0x0099, 2)]);
        let diffs = report.diffs();
        assert_eq!(diffs.len(), 2);

        assert_eq!(diffs[0].index, 0);
        assert_eq!(diffs[0].kind, DiffKind::OpcodeMismatch);
        assert_eq!(diffs[0].expected.as_ref().unwrap().opcode(), 0x0012);
        assert_eq!(diffs[0].actual.as_ref().unwrap().opcode(), 0x0099);

        assert_eq!(diffs[1].index, 1);
        assert_eq!(diffs[1].kind, DiffKind::MissingResponse);
        assert_eq!(diffs[1].expected.as_ref().unwrap().opcode(), 0x0061);
        assert!(diffs[1].actual.is_none());
    }

    #[test]
    fn test_missing_response() {
        let report = compare_packets(&[s2c(0x0012, 2)], &[]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.diffs()[0].kind, DiffKind::MissingResponse);
    }

    #[test]
    fn test_unexpected_extra() {
        let report = compare_packets(&[], &[s2c(0x0012, 2)]);
        assert_eq!(report.len(), 1);
        let diff = &report.diffs()[0];
        assert_eq!(diff.kind, DiffKind::UnexpectedExtra);
        assert_eq!(diff.index, 0);
        assert!(diff.expected.is_none());
    }

    #[test]
    fn test_client_packets_are_ignored() {
        let expected = vec![c2s(0x0014), s2c(0x0012, 3), c2s(0x0017)];
        let actual = vec![s2c(0x0012, 3), c2s(0x0099), c2s(0x0098)];
        assert!(compare_packets(&expected, &actual).is_identical());

        // Stimulus doesn't shift indices
        let expected = vec![c2s(0x0014), s2c(0x0012, 3), s2c(0x0013, 3)];
        let actual = vec![s2c(0x0012, 3), c2s(0x0014), s2c(0x0013, 5)];
        let report = compare_packets(&expected, &actual);
        assert_eq!(report.len(), 1);
        assert_eq!(report.diffs()[0].index, 1);
    }

    #[test]
    fn test_extras_follow_positional_diffs() {
        let expected = vec![s2c(0x0012, 2), s2c(0x0013, 2)];
        let actual = vec![s2c(0x0012, 3), s2c(0x0014, 2), s2c(0x0015, 2), s2c(0x0016, 2)];
        let report = compare_packets(&expected, &actual);
        let kinds: Vec<_> = report.iter().map(|d| (d.index, d.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, DiffKind::SizeDelta { delta: 1 }),
                (1, DiffKind::OpcodeMismatch),
                (2, DiffKind::UnexpectedExtra),
                (3, DiffKind::UnexpectedExtra),
            ]
        );
    }

    #[test]
    fn test_length_mode_ignores_payload_bytes() {
        let exp = PacketRecord::new(0, Direction::ServerToClient, vec![0x00, 0x12, 0x01]);
        let act = PacketRecord::new(0, Direction::ServerToClient, vec![0x00, 0x12, 0x02]);
        assert!(compare_packets(&[exp.clone()], &[act.clone()]).is_identical());

        let report = Comparator::new(CompareConfig::exact()).compare(&[exp], &[act]);
        assert_eq!(report.diffs()[0].kind, DiffKind::PayloadMismatch { offset: 2 });
    }

    #[test]
    fn test_summary() {
        let report = compare_packets(&[s2c(0x0012, 2), s2c(0x0061, 2)], &[s2c(0x0099, 2)]);
        let summary = report.summary();
        assert_eq!(summary.expected_responses, 2);
        assert_eq!(summary.actual_responses, 1);
        assert_eq!(summary.opcode_mismatches, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.divergence_point, Some(0));

        assert_eq!(compare_packets(&[], &[]).summary().divergence_point, None);
    }

    #[test]
    fn test_rendering() {
        let table = OpcodeTable::builtin();
        let report = compare_packets(
            &[s2c(0x0012, 3), s2c(0x0061, 2), s2c(0xFFFF, 2)],
            &[s2c(0x0012, 4), s2c(0x0013, 2)],
        );
        let lines = report.render(&table);
        assert_eq!(lines[0], "#0: 0x0012 (MSG_SYS_ACK) size delta +1 bytes");
        assert_eq!(
            lines[1],
            "#1: opcode mismatch: expected 0x0061 (MSG_MHF_LOADDATA), got 0x0013 (MSG_SYS_TERMINAL_LOG)"
        );
        assert_eq!(lines[2], "#2: expected 0xFFFF (UNKNOWN), got no response");

        let extra = compare_packets(&[], &[s2c(0x0012, 2)]);
        assert_eq!(
            extra.render(&table)[0],
            "#0: unexpected extra response 0x0012 (MSG_SYS_ACK)"
        );
    }
}
