//! Exit codes and output of the `mhfr-replay` binary

#![cfg(feature = "cli")]

use std::path::Path;
use std::process::{Command, Output};

use mhfr_core::{Direction, ServerType, SessionMetadata, TraceHeader, TraceWriter};

fn mhfr_replay(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mhfr-replay"))
        .args(args)
        .env_remove("MHFR_OPCODES")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_capture(path: &Path, responses: &[&[u8]]) {
    let file = std::fs::File::create(path).unwrap();
    let header = TraceHeader::new(ServerType::Channel, 40, 1_000_000_000);
    let mut writer = TraceWriter::new(file, header, &SessionMetadata::new("127.0.0.1", 54001)).unwrap();
    writer
        .write_packet(1_000_000_000, Direction::ClientToServer, &[0x00, 0x14])
        .unwrap();
    for (i, r) in responses.iter().enumerate() {
        writer
            .write_packet(1_000_000_100 + i as i64, Direction::ServerToClient, r)
            .unwrap();
    }
    writer.into_inner().unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_missing_capture_argument() {
    let output = mhfr_replay(&["--mode", "stats"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--capture is required"));
}

#[test]
fn test_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mhfr");
    write_capture(&path, &[&[0x00, 0x12]]);

    let output = mhfr_replay(&["--capture", path.to_str().unwrap(), "--mode", "upload"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown mode: upload"));
}

#[test]
fn test_dump_is_default_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mhfr");
    write_capture(&path, &[&[0x00, 0x12, 0x01]]);

    let output = mhfr_replay(&["--capture", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("Server: channel  ClientMode: 40"));
    assert!(text.contains("0x0012 MSG_SYS_ACK"));
    assert!(text.contains("Total: 2 packets"));
}

#[test]
fn test_json_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mhfr");
    write_capture(&path, &[&[0x00, 0x12, 0x01]]);

    let output = mhfr_replay(&["--capture", path.to_str().unwrap(), "--mode", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["packets"].as_array().unwrap().len(), 2);
    assert_eq!(doc["packets"][1]["elapsed_ns"], 100);

    let output = mhfr_replay(&["--capture", path.to_str().unwrap(), "--mode", "stats"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("C→S: 1 packets (2 bytes)  S→C: 1 packets (3 bytes)"));
}

#[test]
fn test_decode_failure_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.mhfr");
    std::fs::write(&path, b"not a capture").unwrap();

    let output = mhfr_replay(&["--capture", path.to_str().unwrap(), "--mode", "json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid capture"));

    let output = mhfr_replay(&["--capture", dir.path().join("missing.mhfr").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("I/O error"));
}

#[test]
fn test_replay_requires_target_and_is_unimplemented() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mhfr");
    write_capture(&path, &[]);

    let output = mhfr_replay(&["--capture", path.to_str().unwrap(), "--mode", "replay"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--target is required"));

    let output = mhfr_replay(&[
        "--capture",
        path.to_str().unwrap(),
        "--mode",
        "replay",
        "--target",
        "127.0.0.1:54001",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not yet implemented"));
}

#[test]
fn test_diff_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("expected.mhfr");
    let same = dir.path().join("same.mhfr");
    let drifted = dir.path().join("drifted.mhfr");
    write_capture(&expected, &[&[0x00, 0x12, 0x01]]);
    write_capture(&same, &[&[0x00, 0x12, 0x02]]);
    write_capture(&drifted, &[&[0x00, 0x12, 0x01, 0x02]]);

    let run = |actual: &Path, strict: bool| {
        let mut args = vec![
            "--capture",
            expected.to_str().unwrap(),
            "--mode",
            "diff",
            "--against",
            actual.to_str().unwrap(),
        ];
        if strict {
            args.push("--strict");
        }
        mhfr_replay(&args)
    };

    let output = run(&same, false);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("No differences"));

    let output = run(&same, true);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("payload differs at byte 2"));

    let output = run(&drifted, false);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("size delta +1 bytes"));
}

#[test]
fn test_help_exits_zero() {
    let output = mhfr_replay(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("--capture"));
}
