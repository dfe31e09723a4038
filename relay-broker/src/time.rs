//! Microsecond clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in microseconds since the Unix epoch.
///
/// Used to compute the upper bound of a sync window at the moment a
/// request is handled. Producers stamp their own messages; the broker
/// only reads the clock here.
pub fn micros_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
