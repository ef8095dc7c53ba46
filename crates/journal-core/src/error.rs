//! Crate-wide error type.
//!
//! None of these are meant to surface to a filesystem caller as an
//! exception — the public entry points (`log_metadata`, `enqueue`,
//! `write_sync`) collapse them to a `bool` plus a `dropped_events` bump
//! and a `tracing` line. `replay`, which is an offline tool rather than a
//! hot-path call, is the one place this type is returned directly.

use crate::format::FormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("device io error")]
    Io(#[from] std::io::Error),

    #[error("header invalid: {reason}")]
    FormatInvalid { reason: String },

    #[error("entry slot {index} corrupt: {source}")]
    SlotCorruption { index: u64, source: FormatError },

    #[error("payload invalid: {reason}")]
    PayloadInvalid { reason: String },

    #[error("queue at capacity")]
    QueueFull,

    #[error("device not ready")]
    NotReady,

    #[error("journal is shutting down")]
    ShuttingDown,
}

impl From<FormatError> for Error {
    fn from(source: FormatError) -> Self {
        Self::FormatInvalid {
            reason: source.to_string(),
        }
    }
}
