use super::*;
use crate::format;
use crate::raw_writer::RawWriter;
use std::os::unix::fs::FileExt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tempfile::TempDir;

fn sample(tx_id: u64, timestamp_ms: u64, ino: u32) -> Payload {
    Payload {
        tx_id,
        timestamp_ms,
        ino,
        action: "create".into(),
        name: "f".into(),
        ..Payload::default()
    }
}

fn device_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("journal-pipe")
}

#[test]
fn empty_device_replays_to_empty_list() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .unwrap();
    file.set_len(format::DEVICE_SIZE).unwrap();
    drop(file);

    // A never-written, all-zero device has no valid header, but the spec's
    // literal boundary case treats this exactly like an empty log rather
    // than corruption.
    let report = replay(&path).unwrap();
    assert!(report.events.is_empty());
    assert!(report.warnings.is_empty());
}

#[test]
fn replay_after_a_write_returns_empty_but_valid() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(1, 100, 5)]));

    let report = replay(&path).unwrap();
    assert_eq!(report.events.len(), 1);
}

#[test]
fn replay_sorts_by_timestamp_then_tx_id() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[
        sample(1, 100, 1),
        sample(2, 200, 1),
        sample(3, 150, 1),
    ]));

    let report = replay(&path).unwrap();
    let ids: Vec<_> = report.events.iter().map(|p| p.tx_id).collect();
    assert_eq!(ids, vec![1, 3, 2]);
}

#[test]
fn corrupt_payload_byte_aborts_scan_at_that_slot() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(1, 100, 1), sample(2, 200, 1)]));

    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    // Flip a byte inside slot 0's payload region.
    let offset = format::RESERVED + 8; // past the 8-byte magic+version prefix
    file.write_at(&[0xAA], offset).unwrap();
    drop(file);

    assert!(replay(&path).is_err());
}

#[test]
fn large_skew_on_timestamp_reorder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(1, 20_000, 1), sample(2, 100, 1)]));

    assert!(replay(&path).is_err());
}

#[test]
fn small_backward_timestamp_step_is_a_warning_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(1, 200, 1), sample(2, 100, 1)]));

    let report = replay(&path).unwrap();
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn small_tx_id_reorder_with_small_skew_is_a_warning_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(5, 100, 1), sample(4, 150, 1)]));

    let report = replay(&path).unwrap();
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn large_skew_on_tx_id_reorder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    assert!(writer.write_batch(&[sample(5, 100, 1), sample(4, 20_000, 1)]));

    assert!(replay(&path).is_err());
}

#[test]
fn invalid_payload_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = device_path(&dir);
    let writer = RawWriter::new(&path, Arc::new(AtomicU64::new(0)));
    let mut zero_ino = sample(1, 100, 0);
    zero_ino.ino = 0;
    assert!(writer.write_batch(&[zero_ino]));

    assert!(replay(&path).is_err());
}
