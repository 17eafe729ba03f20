//! Tick deadline computation.
//!
//! The tick loop wakes just after every wall-clock :00 and :30 second
//! mark, no matter how long the previous iteration took. Each pass it
//! computes the duration to the next boundary from the current second
//! and sub-second remainder, then blocks until that deadline (or until
//! an external event arrives). Aiming 50 ms past the boundary makes
//! sure the wake-up lands on the far side of the second switch even
//! with coarse timers.

pub mod sync;

use std::time::Duration;

/// Milliseconds past the half-minute boundary the wake-up aims for.
const BOUNDARY_SLACK_MS: i64 = 50;

/// Duration until just after the next :00 or :30 second boundary.
///
/// `second` is the current wall-clock second (0-59) and `subsec_micros`
/// the progress into it. Drift cannot accumulate because the delay is
/// recomputed from the live clock on every pass.
pub fn next_tick_delay(second: i64, subsec_micros: i64) -> Duration {
    let target = if second < 30 { 29 } else { 59 };
    let millis = (1_000 + BOUNDARY_SLACK_MS - subsec_micros / 1_000) + (target - second) * 1_000;
    // The arithmetic cannot go negative for in-range inputs, but a
    // clock read straddling a second switch can hand us second=30
    // with a stale remainder; never sleep backwards.
    Duration::from_millis(millis.max(0) as u64)
}
