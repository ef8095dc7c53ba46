//! The two long-lived background actors: the flusher and the device
//! readiness monitor. Plain `std::thread::spawn` loops running on a
//! preemptive OS scheduler, with no cooperative yields — the same pattern
//! used elsewhere in this codebase for background maintenance loops.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::queue::{FlushWait, Queue};
use crate::raw_writer::{probe_ready, RawWriter};

const NOT_READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Handles for the two background threads, joined on shutdown.
pub struct FlusherHandle {
    flusher: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl FlusherHandle {
    /// Spawns the flusher and readiness-monitor threads.
    pub fn spawn(
        device_path: PathBuf,
        queue: Arc<Queue>,
        writer: Arc<RawWriter>,
        device_ready: Arc<AtomicBool>,
        flush_deadline: Duration,
    ) -> Self {
        let flusher = {
            let queue = Arc::clone(&queue);
            let writer = Arc::clone(&writer);
            let device_ready = Arc::clone(&device_ready);
            std::thread::spawn(move || flusher_loop(&queue, &writer, &device_ready, flush_deadline))
        };

        let monitor = {
            let device_path = device_path.clone();
            let device_ready = Arc::clone(&device_ready);
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || readiness_loop(&device_path, &device_ready, &queue))
        };

        tracing::info!(path = %device_path.display(), "flusher and readiness monitor started");

        Self {
            flusher: Some(flusher),
            monitor: Some(monitor),
        }
    }

    /// Joins the flusher thread (it exits once the queue reports shutdown
    /// and drained). The readiness monitor is best-effort and is not
    /// joined — it simply stops mattering once nothing reads
    /// `device_ready` anymore.
    pub fn join_flusher(&mut self) {
        if let Some(handle) = self.flusher.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FlusherHandle {
    fn drop(&mut self) {
        self.join_flusher();
        // Detach rather than join: a stuck readiness probe (e.g. on a
        // device path that hangs on open) must not block shutdown.
        self.monitor.take();
    }
}

fn flusher_loop(queue: &Queue, writer: &RawWriter, device_ready: &AtomicBool, flush_deadline: Duration) {
    loop {
        // Step 1: busy-wait while the device isn't ready, outside any lock.
        while !device_ready.load(Ordering::Relaxed) {
            if queue.is_shutdown() && queue.is_empty() {
                return;
            }
            std::thread::sleep(NOT_READY_POLL_INTERVAL);
        }

        match queue.wait_and_drain(device_ready, flush_deadline) {
            FlushWait::ShuttingDown => {
                tracing::info!("flusher exiting: shutdown requested and queue drained");
                return;
            }
            FlushWait::NotReady => continue,
            FlushWait::Batch(batch) => {
                let count = batch.len();
                if writer.write_batch(&batch) {
                    tracing::debug!(count, "flushed batch");
                } else {
                    tracing::error!(count, "batch flush failed; entries counted as dropped");
                }
            }
        }
    }
}

fn readiness_loop(device_path: &std::path::Path, device_ready: &AtomicBool, queue: &Queue) {
    loop {
        if queue.is_shutdown() {
            return;
        }
        let ready = probe_ready(device_path);
        let was_ready = device_ready.swap(ready, Ordering::Relaxed);
        if ready && !was_ready {
            tracing::info!(path = %device_path.display(), "journal device became ready");
            queue.nudge();
        } else if !ready && was_ready {
            tracing::warn!(path = %device_path.display(), "journal device no longer ready");
        }
        std::thread::sleep(if ready {
            READY_POLL_INTERVAL
        } else {
            NOT_READY_POLL_INTERVAL
        });
    }
}

#[cfg(test)]
mod flusher_tests;
