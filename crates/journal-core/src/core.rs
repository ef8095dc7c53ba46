//! The `JournalCore` aggregate: the single owner of every piece of state
//! that would otherwise be tempting to reach for as a process-wide
//! `static` (`dropped_events`, `device_ready`, the `tx_id` counter, the
//! device handle). Everything here is a field on a struct built by
//! [`JournalCore::init`] and passed around by reference (an
//! `Arc<JournalCore>` in practice) instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::JournalConfig;
use crate::flusher::FlusherHandle;
use crate::format::Payload;
use crate::logger::{self, Durability, MetadataInfo, StatSnapshot};
use crate::queue::Queue;
use crate::raw_writer::RawWriter;

/// A point-in-time snapshot of the journal's observable counters.
#[derive(Debug, Clone, Copy)]
pub struct JournalStats {
    pub dropped_events: u64,
    pub entries_written: u64,
    pub device_ready: bool,
    pub queue_depth: usize,
}

/// Owns every piece of state a `log_metadata`/`flush_now`/`shutdown` call
/// touches: the bounded queue, the raw writer, the background actors, the
/// per-process tx_id counter, and the ignore-list. Construct one with
/// [`JournalCore::init`] and share it behind an `Arc`.
pub struct JournalCore {
    queue: Arc<Queue>,
    writer: Arc<RawWriter>,
    device_ready: Arc<std::sync::atomic::AtomicBool>,
    dropped_events: Arc<AtomicU64>,
    tx_id: AtomicU64,
    ignore_list: Vec<u32>,
    flusher: Mutex<Option<FlusherHandle>>,
    shut_down: std::sync::atomic::AtomicBool,
}

impl JournalCore {
    /// Opens (or creates) the backing device, spawns the flusher and
    /// readiness-monitor threads, and returns a ready-to-use core.
    pub fn init(config: JournalConfig) -> Self {
        let queue = Arc::new(Queue::new(config.queue_capacity));
        let dropped_events = Arc::new(AtomicU64::new(0));
        let writer = Arc::new(RawWriter::new(config.device_path.clone(), Arc::clone(&dropped_events)));
        let device_ready = Arc::new(std::sync::atomic::AtomicBool::new(false));

        // A regular file standing in for the device (the default,
        // `/tmp/journal-pipe`) must exist before the readiness monitor's
        // open-only probe can ever see it as ready. A real block device is
        // provisioned by the external mount machinery and this call is then
        // a harmless no-op against an already-existing path.
        if let Err(e) = writer.ensure_device_exists() {
            tracing::warn!(
                error = %e,
                path = %config.device_path.display(),
                "failed to pre-create journal device; readiness monitor will keep retrying"
            );
        }

        let flusher = FlusherHandle::spawn(
            config.device_path.clone(),
            Arc::clone(&queue),
            Arc::clone(&writer),
            Arc::clone(&device_ready),
            config.flush_deadline(),
        );

        tracing::info!(path = %config.device_path.display(), "journal core initialized");

        Self {
            queue,
            writer,
            device_ready,
            dropped_events,
            tx_id: AtomicU64::new(0),
            ignore_list: config.ignored_inodes,
            flusher: Mutex::new(Some(flusher)),
            shut_down: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Flags the queue as shutting down, lets the flusher drain what's
    /// left, and joins it. Idempotent — safe to call more than once (the
    /// `Drop` impl calls it as a safety net if a caller forgets to).
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();
        if let Some(mut handle) = self.flusher.lock().take() {
            handle.join_flusher();
        }
        tracing::info!("journal core shut down");
    }

    /// Builds and dispatches a payload for one metadata event. Returns
    /// `false` if the event was rejected or dropped; the reason is logged
    /// and, for capacity/IO drops, reflected in `dropped_events`.
    pub fn log_metadata(&self, node: &StatSnapshot, info: &MetadataInfo, durability: Durability) -> bool {
        if self.ignore_list.contains(&node.ino) {
            return true;
        }

        let tx_id = self.tx_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now_ms = now_ms();
        let payload = logger::build_payload(tx_id, now_ms, node, info);

        match durability {
            Durability::Sync if self.device_ready.load(Ordering::Relaxed) => {
                self.write_sync(&payload)
            }
            Durability::Sync => {
                tracing::warn!(tx_id, "sync write requested before device readiness; rejected");
                false
            }
            Durability::Async => self.enqueue(payload),
        }
    }

    fn write_sync(&self, payload: &Payload) -> bool {
        self.writer.write_sync(payload, self.device_ready.load(Ordering::Relaxed))
    }

    fn enqueue(&self, payload: Payload) -> bool {
        match self.queue.enqueue_payload(payload) {
            Ok(()) => true,
            Err(e @ crate::error::Error::QueueFull) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "enqueue rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "enqueue rejected");
                false
            }
        }
    }

    /// Signals the flusher to drain immediately, as if a new item had
    /// just arrived.
    pub fn flush_now(&self) {
        self.queue.nudge();
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats {
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            entries_written: self.writer.entries_written(),
            device_ready: self.device_ready.load(Ordering::Relaxed),
            queue_depth: self.queue.len(),
        }
    }
}

impl Drop for JournalCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod core_tests;
