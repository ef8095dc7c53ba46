//! Builds a [`Payload`] from a filesystem node and an event descriptor,
//! stamps identity fields, and routes it to the sync or async path.
//!
//! This module owns none of the shared state itself — it's a pure
//! transform plus a dispatch decision, parameterized over the pieces
//! [`crate::JournalCore`] actually owns (tx_id counter, ignore-list,
//! queue, writer, readiness flag), so it's unit-testable without spinning
//! up a real device.

use crate::format::{Payload, MAX_FIELD_LEN};

/// Wall-clock sanity window for `mtime`/`ctime`. Outside this window a
/// stat field is stored as `-1` rather than trusted verbatim: the Unix
/// epoch through the year 2100, wide enough to never reject a real
/// timestamp while still catching obviously-garbage stat data.
pub const MIN_REASONABLE_TIME: i64 = 0;
pub const MAX_REASONABLE_TIME: i64 = 4_102_444_800;

/// The stat snapshot a filesystem node exposes at the moment of the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatSnapshot {
    pub ino: u32,
    pub st_mode: u32,
    pub st_size: u64,
    pub st_nlink: u64,
    pub st_blocks: u64,
    pub mtime: i64,
    pub ctime: i64,
}

/// Optional-override fields, each paired with its own validity bit —
/// mirroring the on-disk `has_*` flags directly rather than using `Option`
/// internally, since the wire format itself is bit-paired fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatOverrides {
    pub mode: Option<u32>,
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

/// The event descriptor passed alongside a [`StatSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct MetadataInfo {
    pub action: String,
    pub name: String,
    pub old_name: String,
    pub new_name: String,
    pub target: String,
    pub extra: String,
    pub parent_ino: u32,
    pub src_parent_ino: u32,
    pub dst_parent_ino: u32,
    pub overrides: StatOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Async,
    Sync,
}

/// Builds the on-disk [`Payload`] for one metadata event: tx_id and
/// timestamp stamping, clamped stat fields, override application, and
/// truncated text fields. Pure and allocation-light aside from the owned
/// `String` fields `Payload` itself carries.
pub fn build_payload(tx_id: u64, now_ms: u64, node: &StatSnapshot, info: &MetadataInfo) -> Payload {
    let mtime = clamp_time(node.mtime);
    let ctime = clamp_time(node.ctime);

    Payload {
        tx_id,
        timestamp_ms: now_ms,
        parent_ino: info.parent_ino,
        src_parent_ino: info.src_parent_ino,
        dst_parent_ino: info.dst_parent_ino,
        ino: node.ino,
        st_mode: info.overrides.mode.unwrap_or(node.st_mode),
        st_size: info.overrides.size.unwrap_or(node.st_size),
        st_nlink: node.st_nlink,
        st_blocks: node.st_blocks,
        mtime,
        ctime,
        uid: info.overrides.uid.unwrap_or(0),
        gid: info.overrides.gid.unwrap_or(0),
        has_mode: info.overrides.mode.is_some(),
        has_size: info.overrides.size.is_some(),
        has_uid: info.overrides.uid.is_some(),
        has_gid: info.overrides.gid.is_some(),
        action: truncate_field(&info.action),
        name: truncate_field(&info.name),
        old_name: truncate_field(&info.old_name),
        new_name: truncate_field(&info.new_name),
        target: truncate_field(&info.target),
        extra: truncate_field(&info.extra),
    }
}

fn clamp_time(value: i64) -> i64 {
    if (MIN_REASONABLE_TIME..=MAX_REASONABLE_TIME).contains(&value) {
        value
    } else {
        -1
    }
}

/// Truncates to `MAX_FIELD_LEN - 1` bytes at a char boundary so the wire
/// encoder's own NUL-padding never has to split a multi-byte character.
fn truncate_field(s: &str) -> String {
    let max = MAX_FIELD_LEN - 1;
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod logger_tests;
