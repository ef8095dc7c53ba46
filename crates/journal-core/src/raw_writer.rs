//! Owns the single backing-device handle and performs all on-device
//! writes: batched (async path) and single-entry synchronous (sync path).
//!
//! Both paths serialize on one `parking_lot::Mutex` guarding a lazily
//! opened [`std::fs::File`]; a stale handle is detected by probing it
//! (a metadata call) and transparently reopened.
//!
//! Positional reads/writes go through `std::os::unix::fs::FileExt`
//! (`read_at`/`write_at`) against a fixed-size raw device, rather than a
//! growable mapped region (see DESIGN.md for the tradeoff).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::format::{self, encode_entry, Header, Payload, ENTRY_SIZE, HEADER_WIRE_SIZE, NUM_ENTRIES, RESERVED};

const HEADER_PERSIST_ATTEMPTS: u32 = 3;
const HEADER_PERSIST_RETRY_DELAY: Duration = Duration::from_millis(1);

struct Inner {
    file: Option<File>,
}

/// The raw circular-log writer. One instance per device; internally
/// single-threaded via its own mutex, so it's safe to share behind an
/// `Arc` across the logger facade, the flusher, and a sync caller.
///
/// `dropped_events` is shared with the queue (via [`crate::JournalCore`])
/// rather than owned exclusively here: it's one process-wide counter,
/// incremented both when the queue rejects on capacity and when the
/// writer fails a batch or sync write.
pub struct RawWriter {
    path: PathBuf,
    inner: Mutex<Inner>,
    dropped_events: Arc<AtomicU64>,
    entries_written: AtomicU64,
}

enum HeaderOutcome {
    Valid(Header),
    EmptyRecoverable,
    HardFail,
}

impl RawWriter {
    pub fn new(path: impl Into<PathBuf>, dropped_events: Arc<AtomicU64>) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(Inner { file: None }),
            dropped_events,
            entries_written: AtomicU64::new(0),
        }
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written.load(Ordering::Relaxed)
    }

    /// Writes every payload into consecutive slots starting at the live
    /// `end_index`, advancing `start_index` on wrap, then persists the
    /// header once for the whole batch. All-or-nothing: a mid-batch
    /// failure fails the entire batch and counts every entry as dropped.
    pub fn write_batch(&self, entries: &[Payload]) -> bool {
        if entries.is_empty() {
            return true;
        }
        let mut guard = self.inner.lock();
        let file = match self.ensure_open(&mut guard) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, path = %self.path.display(), "failed to open journal device");
                self.dropped_events
                    .fetch_add(entries.len() as u64, Ordering::Relaxed);
                return false;
            }
        };

        let (mut start, mut end) = match read_header(file) {
            HeaderOutcome::Valid(header) => (header.start_index, header.end_index),
            HeaderOutcome::EmptyRecoverable => (0, 0),
            HeaderOutcome::HardFail => {
                tracing::error!(path = %self.path.display(), "hard failure reading journal header");
                self.dropped_events
                    .fetch_add(entries.len() as u64, Ordering::Relaxed);
                return false;
            }
        };

        for payload in entries {
            if let Err(e) = write_one_slot(file, &mut start, &mut end, payload) {
                tracing::error!(error = %e, "failed writing journal entry slot");
                self.dropped_events
                    .fetch_add(entries.len() as u64, Ordering::Relaxed);
                return false;
            }
        }

        if !persist_header(file, start, end) {
            // The data is already on-device even though the pointer lags;
            // the replayer's own validation handles the inconsistency on
            // next read. Do not re-fail an already-written batch.
            tracing::error!(
                path = %self.path.display(),
                "header persist failed after batch write; on-device data outruns the header"
            );
        }

        self.entries_written
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        true
    }

    /// Writes a single payload, fsyncs the slot, then writes+fsyncs the
    /// header. Only proceeds if the caller reports the device as ready;
    /// otherwise fails without touching the device.
    pub fn write_sync(&self, payload: &Payload, device_ready: bool) -> bool {
        if !device_ready {
            return false;
        }
        let mut guard = self.inner.lock();
        let file = match self.ensure_open(&mut guard) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, path = %self.path.display(), "failed to open journal device");
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        let (mut start, mut end) = match read_header(file) {
            HeaderOutcome::Valid(header) => (header.start_index, header.end_index),
            HeaderOutcome::EmptyRecoverable => (0, 0),
            HeaderOutcome::HardFail => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        if let Err(e) = write_one_slot(file, &mut start, &mut end, payload) {
            tracing::error!(error = %e, "sync write failed");
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if file.sync_all().is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if !persist_header(file, start, end) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.entries_written.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Opens the device if it isn't already open, or reopens it if the
    /// handle has gone stale (probed via a metadata call). Ensures the
    /// file is at least `DEVICE_SIZE` bytes.
    fn ensure_open<'a>(&self, guard: &'a mut parking_lot::MutexGuard<'_, Inner>) -> std::io::Result<&'a mut File> {
        let needs_reopen = match &guard.file {
            None => true,
            Some(file) => file.metadata().is_err(),
        };
        if needs_reopen {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&self.path)?;
            if file.metadata()?.len() < format::DEVICE_SIZE {
                file.set_len(format::DEVICE_SIZE)?;
            }
            guard.file = Some(file);
        }
        Ok(guard.file.as_mut().expect("file set above"))
    }

    /// Creates the backing file (sized to `DEVICE_SIZE`) if it doesn't
    /// already exist, without performing any header or entry I/O.
    ///
    /// [`probe_ready`] only opens the device — it deliberately never
    /// creates it, since a real backing device is provisioned by the
    /// mount machinery this crate treats as external. A regular file
    /// standing in for that device (the common case, e.g. the default
    /// `/tmp/journal-pipe` path) has no equivalent provisioning step, so
    /// without this call the readiness monitor would probe a path that
    /// never comes into existence and the journal would never become
    /// ready. Called once at [`crate::JournalCore::init`].
    pub fn ensure_device_exists(&self) -> std::io::Result<()> {
        let mut guard = self.inner.lock();
        self.ensure_open(&mut guard)?;
        Ok(())
    }
}

/// Reads and validates the header: short read, bad magic, bad version,
/// CRC mismatch, or out-of-range indices are all empty-but-recoverable.
/// Only an I/O error on the read itself (standing in for EIO) is a hard
/// failure.
fn read_header(file: &File) -> HeaderOutcome {
    let mut buf = [0u8; HEADER_WIRE_SIZE];
    match file.read_at(&mut buf, 0) {
        Ok(n) if n == HEADER_WIRE_SIZE => match Header::from_bytes(&buf).and_then(|h| h.validate().map(|_| h)) {
            Ok(header) => HeaderOutcome::Valid(header),
            Err(_) => HeaderOutcome::EmptyRecoverable,
        },
        Ok(_) => HeaderOutcome::EmptyRecoverable,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => HeaderOutcome::EmptyRecoverable,
        Err(_) => HeaderOutcome::HardFail,
    }
}

/// Appends one entry at the live `end` index, advancing `start` on wrap
/// (evicting the oldest entry), and writes the encoded slot to disk.
fn write_one_slot(file: &File, start: &mut u64, end: &mut u64, payload: &Payload) -> std::io::Result<()> {
    let next = (*end + 1) % NUM_ENTRIES;
    if next == *start {
        *start = (*start + 1) % NUM_ENTRIES;
    }
    let encoded = encode_entry(payload);
    let offset = RESERVED + *end * ENTRY_SIZE;
    file.write_at(&encoded.0, offset)?;
    *end = next;
    Ok(())
}

/// Builds a fresh header from the current indices and persists it with up
/// to three attempts, sleeping ~1ms between retries.
fn persist_header(file: &File, start: u64, end: u64) -> bool {
    let header = Header::new(start, end);
    let bytes = header.to_bytes();
    for attempt in 0..HEADER_PERSIST_ATTEMPTS {
        if file.write_at(&bytes, 0).is_ok() && file.sync_all().is_ok() {
            return true;
        }
        if attempt + 1 < HEADER_PERSIST_ATTEMPTS {
            std::thread::sleep(HEADER_PERSIST_RETRY_DELAY);
        }
    }
    false
}

/// Probes whether the device at `path` is ready: opens for read/write,
/// fsyncs, and can read at least one byte from offset 0. Used by the
/// readiness monitor.
pub fn probe_ready(path: &Path) -> bool {
    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    if file.sync_all().is_err() {
        return false;
    }
    let mut buf = [0u8; 1];
    matches!(file.read_at(&mut buf, 0), Ok(n) if n >= 1)
}

/// Decodes one entry slot at logical index `i`, for the replayer.
pub fn read_slot(file: &File, i: u64) -> std::io::Result<[u8; ENTRY_SIZE as usize]> {
    let mut buf = [0u8; ENTRY_SIZE as usize];
    let n = file.read_at(&mut buf, RESERVED + i * ENTRY_SIZE)?;
    if n != buf.len() {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short slot read"));
    }
    Ok(buf)
}

#[cfg(test)]
mod raw_writer_tests;
