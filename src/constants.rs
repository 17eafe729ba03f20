//! Application-wide constants and configuration defaults.

/// Timezone descriptor used when the configuration does not provide one.
/// Western Europe with the current EU daylight rules.
pub const DEFAULT_TIMEZONE: &str = "CET-1CEST-2,M3.5.0/2,M10.5.0/3";

/// Default NTP server handed to the network time collaborator. Opaque to
/// this core.
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";

/// Minutes without a completed network sync before the hardware clock is
/// used to correct the system clock.
pub const DEFAULT_NO_SYNC_THRESHOLD: u32 = 121;

/// Minutes added to the pending alarm by one snooze press.
pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;

/// Whether stopping a sounding alarm leaves it armed for the next day.
pub const DEFAULT_ALARM_STAYS_ARMED: bool = true;

/// Step size in minutes for manual alarm-time adjustment.
pub const ALARM_ADJUST_MINUTES: i32 = 5;

/// Fixed number of schedule slots. Slot 0 is always the primary alarm.
pub const SCHEDULE_SLOTS: usize = 20;

/// Ticks an edited settings blob stays dirty before it is written out.
/// Ticks arrive twice a minute, so this delays writes by about five
/// minutes and coalesces bursts of edits into one store operation.
pub const PERSIST_DELAY_TICKS: u32 = 10;

/// Name under which the alarm settings blob is stored.
pub const SETTINGS_BLOB: &str = "clock";

/// Exit code used when startup fails before the loop begins.
pub const EXIT_FAILURE: i32 = 1;
