//! Host-side implementations of the hardware seams.
//!
//! On the appliance these are backed by the RTC chip driver, the sound
//! pipeline and the LED matrix. On a workstation the daemon runs with
//! the stand-ins below so the whole scheduling core can be exercised
//! end to end.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{AudioSink, HardwareClock, SyncMonitor, SystemClock, TickSink};
use crate::error::ClockError;
use crate::sched::sync::SyncStatus;
use crate::tz::calendar::{LocalTime, UtcSeconds};

fn raw_system_now() -> (UtcSeconds, i64) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_secs() as i64, i64::from(elapsed.subsec_micros())),
        // A host clock before 1970 has bigger problems; clamp.
        Err(_) => (0, 0),
    }
}

/// System clock built on the host's wall clock.
///
/// Unprivileged processes cannot step the real clock, so corrections
/// are kept as an offset applied on read. On the appliance this trait
/// maps straight onto the RTOS time-of-day calls.
#[derive(Debug, Default)]
pub struct HostSystemClock {
    correction: i64,
}

impl SystemClock for HostSystemClock {
    fn now_utc(&self) -> UtcSeconds {
        raw_system_now().0 + self.correction
    }

    fn subsec_micros(&self) -> i64 {
        raw_system_now().1
    }

    fn set_utc(&mut self, instant: UtcSeconds) {
        self.correction = instant - raw_system_now().0;
    }
}

/// Stand-in for the battery-backed clock chip: an offset from the raw
/// host clock, so it survives corrections to the system clock and can
/// legitimately disagree with it.
#[derive(Debug, Default)]
pub struct SoftHardwareClock {
    offset: i64,
}

impl HardwareClock for SoftHardwareClock {
    fn read(&mut self) -> Result<UtcSeconds, ClockError> {
        Ok(raw_system_now().0 + self.offset)
    }

    fn write(&mut self, instant: UtcSeconds) -> Result<(), ClockError> {
        self.offset = instant - raw_system_now().0;
        Ok(())
    }
}

/// Sync monitor for hosts without the network time collaborator wired
/// up: permanently idle, so the hardware clock ends up authoritative.
#[derive(Debug, Default)]
pub struct IdleSyncMonitor;

impl SyncMonitor for IdleSyncMonitor {
    fn status(&mut self) -> SyncStatus {
        SyncStatus::Idle
    }
}

/// Audio sink that only logs what would be played.
#[derive(Debug, Default)]
pub struct LoggingAudioSink;

impl AudioSink for LoggingAudioSink {
    fn play(&mut self, sound: &str, looped: bool) -> Result<(), ClockError> {
        if looped {
            log_decorated!("Playing {sound} (looping until stopped)");
        } else {
            log_decorated!("Playing {sound} once");
        }
        Ok(())
    }

    fn stop(&mut self) {
        log_decorated!("Playback stopped");
    }
}

/// Display stand-in: writes the time to the log once per minute, the
/// way the LED matrix redraws on the appliance.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    last_minute: Option<i32>,
}

impl TickSink for ConsoleDisplay {
    fn tick(&mut self, local: &LocalTime) {
        if self.last_minute != Some(local.minute) {
            self.last_minute = Some(local.minute);
            log_decorated!("{:02}:{:02}", local.hour, local.minute);
        }
    }
}
