//! # journal-core
//!
//! A crash-safe metadata journal for a microkernel-style disk filesystem.
//!
//! Filesystem operations hand metadata-mutation events (create, unlink,
//! rename, chmod, chown, truncate, …) to [`JournalCore::log_metadata`],
//! which either persists them immediately (`Durability::Sync`) or enqueues
//! them for a background flusher to batch onto a fixed-size raw device
//! arranged as a circular log (`Durability::Async`). After a crash, the
//! on-device log is self-describing — magic, version, and a CRC-protected
//! header — and [`replayer::replay`] can validate and replay it in arrival
//! order, either as an embedded first-access check or as an offline tool.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use journal_core::{Durability, JournalConfig, JournalCore, MetadataInfo, StatSnapshot};
//!
//! let core = JournalCore::init(JournalConfig::default());
//!
//! let node = StatSnapshot {
//!     ino: 42,
//!     st_mode: 0o100_644,
//!     st_size: 0,
//!     st_nlink: 1,
//!     st_blocks: 0,
//!     mtime: 0,
//!     ctime: 0,
//! };
//! let info = MetadataInfo {
//!     action: "create".into(),
//!     name: "hello.txt".into(),
//!     parent_ino: 1,
//!     ..MetadataInfo::default()
//! };
//!
//! core.log_metadata(&node, &info, Durability::Async);
//! core.shutdown();
//! ```
//!
//! Out of scope (treated as external collaborators): the filesystem
//! operations that call `log_metadata`, the backing device's mount
//! machinery, and the concrete inode/stat extraction from host filesystem
//! nodes. This crate only pins the contract at those boundaries.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod core;
mod error;
mod flusher;
mod format;
mod logger;
mod queue;
mod raw_writer;
mod replayer;

pub use config::JournalConfig;
pub use core::{JournalCore, JournalStats};
pub use error::Error;
pub use format::{
    Header, Payload, DEVICE_SIZE, ENTRY_SIZE, MAGIC, MAX_FIELD_LEN, NUM_ENTRIES, RESERVED, VERSION,
};
pub use logger::{Durability, MetadataInfo, StatOverrides, StatSnapshot, MAX_REASONABLE_TIME, MIN_REASONABLE_TIME};
pub use queue::{FLUSH_DEADLINE_DEFAULT, QUEUE_CAPACITY_DEFAULT};
pub use replayer::{replay, ReplayReport};
