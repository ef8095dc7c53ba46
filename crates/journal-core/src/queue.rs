//! Bounded in-memory queue between producers and the flusher.
//!
//! A fixed-capacity ring buffer with `head`/`tail`/`count`/`shutdown` under
//! one `parking_lot::Mutex`, paired with one `parking_lot::Condvar`, rather
//! than a channel. Enqueue never blocks: it takes the lock, checks
//! capacity, and either copies the payload in or rejects. All
//! batch-accumulation waiting happens on the flusher side, in
//! [`Queue::wait_and_drain`].

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Error;
use crate::format::Payload;

/// Default queue capacity.
pub const QUEUE_CAPACITY_DEFAULT: usize = 4096;
/// Default flusher batch-accumulation deadline.
pub const FLUSH_DEADLINE_DEFAULT: Duration = Duration::from_millis(500);

struct State {
    slots: Vec<Payload>,
    head: usize,
    tail: usize,
    count: usize,
    shutdown: bool,
}

/// Outcome of one `wait_and_drain` cycle, handed back to the flusher loop.
pub enum FlushWait {
    /// A batch is ready, in enqueue order.
    Batch(Vec<Payload>),
    /// The device isn't ready; the caller should restart from its own
    /// device-readiness busy-wait rather than drain.
    NotReady,
    /// Shutdown was requested and the queue is empty; the flusher should exit.
    ShuttingDown,
}

pub struct Queue {
    capacity: usize,
    state: Mutex<State>,
    cond: Condvar,
}

impl Queue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            capacity,
            state: Mutex::new(State {
                slots: vec![Payload::default(); capacity],
                head: 0,
                tail: 0,
                count: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues one wire-encoded payload, rejecting it if its length
    /// doesn't match `sizeof(Payload)`.
    ///
    /// Takes bytes, not a [`Payload`], so that an external caller handing
    /// the journal raw bytes across a boundary (an FFI edge, say) gets the
    /// size check for free. Callers already holding a typed [`Payload`]
    /// go through [`Queue::enqueue_payload`], which always has the right
    /// size.
    pub fn enqueue(&self, payload_bytes: &[u8]) -> Result<(), Error> {
        let payload = Payload::from_bytes(payload_bytes).map_err(|source| Error::PayloadInvalid {
            reason: source.to_string(),
        })?;
        self.enqueue_payload(payload)
    }

    /// Enqueues an already-typed payload. Never fails on size (the type
    /// system already guarantees it); can still be rejected for capacity
    /// or shutdown.
    pub fn enqueue_payload(&self, payload: Payload) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Error::ShuttingDown);
        }
        if state.count == self.capacity {
            return Err(Error::QueueFull);
        }
        let tail = state.tail;
        state.slots[tail] = payload;
        state.tail = (tail + 1) % self.capacity;
        state.count += 1;
        drop(state);
        self.cond.notify_one();
        Ok(())
    }

    /// Flags shutdown and wakes anyone waiting on the condition. The
    /// flusher drains whatever remains, then its loop exits on the next
    /// empty `ShuttingDown` outcome.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        self.cond.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Wakes the flusher as if a new item had arrived, without enqueueing
    /// anything. Used by `flush_now()` to force an immediate drain of
    /// whatever is already queued.
    pub fn nudge(&self) {
        self.cond.notify_all();
    }

    /// Implements the flusher's steps 2-6: wait for at least one item,
    /// coalesce additional items up to `deadline`, bail out without
    /// draining if the device isn't ready, otherwise snapshot and clear a
    /// contiguous prefix in head order.
    ///
    /// Step 1 (busy-wait while the device isn't ready, before even
    /// touching the queue lock) lives in the caller ([`crate::flusher`]),
    /// since it must run with the queue lock *not* held.
    pub fn wait_and_drain(&self, device_ready: &std::sync::atomic::AtomicBool, deadline: Duration) -> FlushWait {
        use std::sync::atomic::Ordering;

        let mut state = self.state.lock();
        while state.count == 0 {
            if state.shutdown {
                return FlushWait::ShuttingDown;
            }
            self.cond.wait(&mut state);
        }

        let batch_deadline = Instant::now() + deadline;
        while state.count < self.capacity && !state.shutdown {
            let now = Instant::now();
            if now >= batch_deadline {
                break;
            }
            let timeout = batch_deadline - now;
            let result = self.cond.wait_for(&mut state, timeout);
            if result.timed_out() {
                break;
            }
        }

        if !device_ready.load(Ordering::Relaxed) {
            return FlushWait::NotReady;
        }

        FlushWait::Batch(drain_locked(&mut state, self.capacity))
    }
}

fn drain_locked(state: &mut State, capacity: usize) -> Vec<Payload> {
    let batch_count = state.count;
    let mut batch = Vec::with_capacity(batch_count);
    let mut idx = state.head;
    for _ in 0..batch_count {
        batch.push(std::mem::replace(&mut state.slots[idx], Payload::default()));
        idx = (idx + 1) % capacity;
    }
    state.head = idx;
    state.count = 0;
    batch
}

#[cfg(test)]
mod queue_tests;

#[cfg(all(test, loom))]
mod queue_loom_tests;
