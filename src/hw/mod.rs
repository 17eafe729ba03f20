//! Collaborator seams for the appliance hardware.
//!
//! The scheduling core talks to the rest of the appliance through the
//! traits below: the adjustable system clock, the battery-backed
//! hardware clock chip, the network time monitor, the audio pipeline
//! and the display. All calls are blocking and invoked from the tick
//! loop's own context; implementations may fail (bus busy, timeout) and
//! report it, but the loop itself never stops on a collaborator error.

pub mod host;

use crate::error::ClockError;
use crate::sched::sync::SyncStatus;
use crate::tz::calendar::{LocalTime, UtcSeconds};

/// The appliance's adjustable system clock (UTC).
pub trait SystemClock {
    fn now_utc(&self) -> UtcSeconds;
    /// Progress into the current second, for tick deadline computation.
    fn subsec_micros(&self) -> i64;
    fn set_utc(&mut self, instant: UtcSeconds);
}

/// The battery-backed clock chip. Keeps UTC.
pub trait HardwareClock {
    fn read(&mut self) -> Result<UtcSeconds, ClockError>;
    fn write(&mut self, instant: UtcSeconds) -> Result<(), ClockError>;
}

/// Status feed of the network time collaborator. `status()` observes
/// the latest state; a finished sync is reported as `Completed` once.
pub trait SyncMonitor {
    fn status(&mut self) -> SyncStatus;
}

/// The audio playback pipeline. Requests are fire-and-forget; the
/// pipeline handles decoding and mixing on its own.
pub trait AudioSink {
    fn play(&mut self, sound: &str, looped: bool) -> Result<(), ClockError>;
    fn stop(&mut self);
}

/// Consumer of the per-tick local time, typically the display and menu
/// subsystem.
pub trait TickSink {
    fn tick(&mut self, local: &LocalTime);
}

/// Manually set the time from an externally supplied UTC instant.
///
/// Writes the system clock first so the appliance shows the new time
/// immediately even when the hardware clock write fails; the failure is
/// still reported to the caller.
pub fn set_clock(
    system: &mut dyn SystemClock,
    hardware: &mut dyn HardwareClock,
    instant: UtcSeconds,
) -> Result<(), ClockError> {
    system.set_utc(instant);
    hardware.write(instant)
}
