//! Offline scan of a journal device into an ordered event stream.
//!
//! `replay` opens the device read-only, validates the header, walks every
//! occupied slot from `start_index` to `end_index`, and on full success
//! sorts the result by `(timestamp_ms, tx_id)` — the ordering the logger's
//! dual tx_id generator makes necessary, since a sync write can land
//! on-device "out of turn" relative to queued async writes sharing the
//! same counter.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Error;
use crate::format::{Header, Payload, HEADER_WIRE_SIZE, NUM_ENTRIES};
use crate::raw_writer::read_slot;

/// Timestamp skew, in milliseconds, beyond which an out-of-order entry is
/// treated as a fatal replay error rather than a logged warning.
const MAX_TIMESTAMP_SKEW_MS: u64 = 10_000;

/// The result of a clean replay: an ordered event stream plus any
/// non-fatal monotonicity warnings observed along the way.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub events: Vec<Payload>,
    pub warnings: Vec<String>,
}

pub fn replay(path: &Path) -> Result<ReplayReport, Error> {
    let file = File::open(path)?;

    let mut header_bytes = [0u8; HEADER_WIRE_SIZE];
    let n = file.read_at(&mut header_bytes, 0)?;
    if n != HEADER_WIRE_SIZE {
        return Err(Error::FormatInvalid {
            reason: format!("short header read: {n} of {HEADER_WIRE_SIZE} bytes"),
        });
    }

    // A device that has never been written is all zero bytes, which fails
    // magic/CRC validation the same way real corruption would. The writer's
    // own header bootstrap treats this state as an empty-but-recoverable
    // log rather than a fault (4.2.1); the replayer must agree, so a fresh
    // device replays to an empty list rather than an error.
    if header_bytes.iter().all(|&b| b == 0) {
        return Ok(ReplayReport::default());
    }

    let header = Header::from_bytes(&header_bytes)?;
    header.validate()?;

    let mut events = Vec::new();
    let mut warnings = Vec::new();
    let mut last_tx_id: Option<u64> = None;
    let mut last_timestamp: Option<u64> = None;

    let mut i = header.start_index;
    while i != header.end_index {
        let slot = read_slot(&file, i).map_err(|source| Error::FormatInvalid {
            reason: format!("short slot read at index {i}: {source}"),
        })?;

        let payload = crate::format::decode_entry(&slot).map_err(|source| Error::SlotCorruption { index: i, source })?;

        if payload.action.is_empty() || payload.ino == 0 {
            return Err(Error::PayloadInvalid {
                reason: format!("slot {i}: empty action or zero ino"),
            });
        }

        check_monotonicity(&payload, &mut last_tx_id, &mut last_timestamp, &mut warnings)?;

        events.push(payload);
        i = (i + 1) % NUM_ENTRIES;
    }

    events.sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then(a.tx_id.cmp(&b.tx_id)));

    Ok(ReplayReport { events, warnings })
}

fn check_monotonicity(
    payload: &Payload,
    last_tx_id: &mut Option<u64>,
    last_timestamp: &mut Option<u64>,
    warnings: &mut Vec<String>,
) -> Result<(), Error> {
    // A decreasing timestamp_ms is an expected artifact of the flusher's
    // batch-accumulation window (entries land on-device in enqueue order,
    // not necessarily in timestamp order, when a slow producer races a
    // fast one within the same batch) — not corruption by itself, as long
    // as the step backwards is small. A step larger than the skew
    // tolerance is treated as real corruption rather than ordinary
    // scheduling jitter; `replay`'s own `(timestamp_ms, tx_id)` sort
    // recovers the correct order for the tolerated case.
    if let Some(prev_timestamp) = *last_timestamp {
        if payload.timestamp_ms < prev_timestamp {
            let skew = prev_timestamp - payload.timestamp_ms;
            if skew > MAX_TIMESTAMP_SKEW_MS {
                return Err(Error::FormatInvalid {
                    reason: format!(
                        "timestamp went backwards ({} < {prev_timestamp}) by {skew}ms, exceeding {MAX_TIMESTAMP_SKEW_MS}ms"
                    ),
                });
            }
            warnings.push(format!(
                "timestamp went backwards on-device: {} < {prev_timestamp} (skew {skew}ms, within tolerance)",
                payload.timestamp_ms
            ));
        }
    }

    // tx_id decreasing on-device is an expected artifact of the dual
    // sync/async generator, not corruption by itself — but only when it
    // rides along a small timestamp skew, the same tolerance the backward-
    // timestamp rule above uses. A decreasing tx_id paired with a large
    // timestamp skew (in either direction) is treated as real corruption
    // rather than the benign sync/async race.
    if let (Some(prev_tx_id), Some(prev_timestamp)) = (*last_tx_id, *last_timestamp) {
        if payload.tx_id < prev_tx_id {
            let skew = payload.timestamp_ms.abs_diff(prev_timestamp);
            if skew > MAX_TIMESTAMP_SKEW_MS {
                return Err(Error::FormatInvalid {
                    reason: format!(
                        "tx_id went backwards ({} < {prev_tx_id}) alongside a {skew}ms skew, exceeding {MAX_TIMESTAMP_SKEW_MS}ms"
                    ),
                });
            }
            warnings.push(format!(
                "tx_id went backwards on-device: {} < {prev_tx_id} (expected given the dual sync/async generator, see design notes)",
                payload.tx_id
            ));
        }
    }

    *last_tx_id = Some(payload.tx_id);
    *last_timestamp = Some(payload.timestamp_ms);
    Ok(())
}

#[cfg(test)]
mod replayer_tests;
