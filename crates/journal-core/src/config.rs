//! Runtime-layer configuration.
//!
//! The on-disk layout constants (`DEVICE_SIZE`, `RESERVED`, `ENTRY_SIZE`,
//! `MAGIC`, `VERSION`, `MAX_FIELD_LEN`) stay `const` in [`crate::format`] —
//! they are load-bearing for wire compatibility and are deliberately not
//! exposed here. Everything that can vary between a test run, a dev box,
//! and a mounted filesystem without touching the on-device format lives in
//! `JournalConfig`, layered with `figment` the way the rest of this
//! workspace layers configuration: compiled-in defaults, then an optional
//! TOML file, then `JOURNAL_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::queue::QUEUE_CAPACITY_DEFAULT;

const FLUSH_DEADLINE_MS_DEFAULT: u64 = 500;

/// Runtime knobs for a [`crate::JournalCore`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Path to the raw backing device (a regular file sized `DEVICE_SIZE`
    /// acting as the backing store works fine for tests and for any host
    /// that doesn't expose a real block device at this path).
    pub device_path: PathBuf,

    /// Bounded in-memory queue capacity. Defaults to 4096; shrunk in
    /// tests to exercise the reject-on-full path cheaply.
    pub queue_capacity: usize,

    /// Upper bound, in milliseconds, on how long the flusher coalesces a
    /// batch before forcing a write. Defaults to 500 ms.
    pub flush_deadline_ms: u64,

    /// Inodes the logger facade silently ignores, as a configurable set
    /// rather than a hard-coded list.
    pub ignored_inodes: Vec<u32>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/tmp/journal-pipe"),
            queue_capacity: QUEUE_CAPACITY_DEFAULT,
            flush_deadline_ms: FLUSH_DEADLINE_MS_DEFAULT,
            ignored_inodes: Vec::new(),
        }
    }
}

impl JournalConfig {
    pub fn flush_deadline(&self) -> Duration {
        Duration::from_millis(self.flush_deadline_ms)
    }

    /// Loads configuration by layering compiled-in defaults, an optional
    /// `Journal.toml` in the current directory, and `JOURNAL_*` environment
    /// variables, in that order of increasing precedence.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("Journal.toml"))
            .merge(Env::prefixed("JOURNAL_"))
            .extract()
    }
}

#[cfg(test)]
mod config_tests;
