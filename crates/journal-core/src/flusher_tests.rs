use super::*;
use crate::format::Payload;
use std::sync::atomic::{AtomicBool, AtomicU64};
use tempfile::TempDir;

fn sample(tx_id: u64) -> Payload {
    Payload {
        tx_id,
        action: "create".into(),
        name: "f".into(),
        ino: 1,
        ..Payload::default()
    }
}

#[test]
fn flusher_drains_queue_and_writes_to_device() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal-pipe");
    let queue = Arc::new(Queue::new(8));
    let writer = Arc::new(RawWriter::new(&path, Arc::new(AtomicU64::new(0))));
    let device_ready = Arc::new(AtomicBool::new(true));

    for i in 0..3 {
        queue.enqueue_payload(sample(i)).unwrap();
    }

    let mut handle = FlusherHandle::spawn(path.clone(), Arc::clone(&queue), Arc::clone(&writer), device_ready, Duration::from_millis(50));

    // Give the flusher a moment to drain, then shut down and join.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while writer.entries_written() < 3 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    queue.shutdown();
    handle.join_flusher();

    assert_eq!(writer.entries_written(), 3);
}

#[test]
fn flusher_exits_promptly_on_shutdown_with_empty_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal-pipe");
    let queue = Arc::new(Queue::new(8));
    let writer = Arc::new(RawWriter::new(&path, Arc::new(AtomicU64::new(0))));
    let device_ready = Arc::new(AtomicBool::new(true));

    let mut handle = FlusherHandle::spawn(path, queue.clone(), writer, device_ready, Duration::from_millis(50));
    queue.shutdown();
    handle.join_flusher();
}

#[test]
fn flusher_does_not_drain_while_device_unready() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal-pipe");
    let queue = Arc::new(Queue::new(8));
    let writer = Arc::new(RawWriter::new(&path, Arc::new(AtomicU64::new(0))));
    let device_ready = Arc::new(AtomicBool::new(false));

    queue.enqueue_payload(sample(0)).unwrap();
    let mut handle = FlusherHandle::spawn(path, Arc::clone(&queue), Arc::clone(&writer), Arc::clone(&device_ready), Duration::from_millis(50));

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(writer.entries_written(), 0, "nothing should be written while the device is unready");

    queue.shutdown();
    handle.join_flusher();
}
