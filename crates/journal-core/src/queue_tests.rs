use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

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
fn enqueue_then_drain_preserves_fifo_order() {
    let queue = Queue::new(8);
    for i in 0..5 {
        queue.enqueue_payload(sample(i)).unwrap();
    }
    let ready = AtomicBool::new(true);
    match queue.wait_and_drain(&ready, Duration::from_millis(10)) {
        FlushWait::Batch(batch) => {
            let ids: Vec<_> = batch.iter().map(|p| p.tx_id).collect();
            assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        }
        _ => panic!("expected a batch"),
    }
}

#[test]
fn enqueue_rejects_when_full() {
    let queue = Queue::new(2);
    queue.enqueue_payload(sample(0)).unwrap();
    queue.enqueue_payload(sample(1)).unwrap();
    assert!(matches!(
        queue.enqueue_payload(sample(2)),
        Err(Error::QueueFull)
    ));
}

#[test]
fn enqueue_rejects_wrong_size_bytes() {
    let queue = Queue::new(2);
    let too_short = vec![0u8; 10];
    assert!(matches!(
        queue.enqueue(&too_short),
        Err(Error::PayloadInvalid { .. })
    ));
}

#[test]
fn enqueue_round_trips_through_bytes() {
    let queue = Queue::new(2);
    let payload = sample(9);
    queue.enqueue(&payload.to_bytes()).unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn enqueue_after_shutdown_is_rejected() {
    let queue = Queue::new(2);
    queue.shutdown();
    assert!(matches!(
        queue.enqueue_payload(sample(0)),
        Err(Error::ShuttingDown)
    ));
}

#[test]
fn wait_and_drain_exits_on_shutdown_when_empty() {
    let queue = Queue::new(2);
    queue.shutdown();
    let ready = AtomicBool::new(true);
    assert!(matches!(
        queue.wait_and_drain(&ready, Duration::from_millis(10)),
        FlushWait::ShuttingDown
    ));
}

#[test]
fn wait_and_drain_declines_to_drain_when_device_not_ready() {
    let queue = Queue::new(2);
    queue.enqueue_payload(sample(0)).unwrap();
    let ready = AtomicBool::new(false);
    assert!(matches!(
        queue.wait_and_drain(&ready, Duration::from_millis(10)),
        FlushWait::NotReady
    ));
    // the batch was never drained, so the entry is still queued.
    assert_eq!(queue.len(), 1);
}

#[test]
fn wait_and_drain_respects_deadline_for_partial_batches() {
    let queue = Arc::new(Queue::new(8));
    queue.enqueue_payload(sample(0)).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            let _ = queue.enqueue_payload(sample(1));
        })
    };

    let ready = AtomicBool::new(true);
    let started = Instant::now();
    let batch = match queue.wait_and_drain(&ready, Duration::from_millis(50)) {
        FlushWait::Batch(batch) => batch,
        _ => panic!("expected a batch"),
    };
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(batch.len(), 1, "the deadline must cut the batch before the slow producer lands");
    producer.join().unwrap();
}

#[test]
fn concurrent_producers_are_all_observed_in_some_total_order() {
    let queue = Arc::new(Queue::new(256));
    let mut handles = Vec::new();
    for producer in 0..4u64 {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..20u64 {
                let _ = queue.enqueue_payload(sample(producer * 1000 + i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(queue.len(), 80);
}
