//! Alarm schedule types and the mutable alarm state.
//!
//! The schedule is a fixed table of twenty slots. Slot 0 is the primary
//! alarm: the only entry that can be armed, disarmed and snoozed. Every
//! other slot is an ancillary sound that plays once, un-looped, when its
//! time (and optional weekday or date constraint) matches.
//!
//! The pending alarm is tracked separately from slot 0's configured
//! time because snoozing moves the next ring without touching the
//! stored schedule.

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ALARM_STAYS_ARMED, DEFAULT_SNOOZE_MINUTES, SCHEDULE_SLOTS};
use crate::error::ClockError;
use crate::tz::calendar::LocalTime;

/// One schedule slot.
///
/// `month` (1-12), `day` (1-31) and `weekday` (1-7, Sunday first) use 0
/// as the wildcard. `is_alarm` marks entries that substitute the primary
/// alarm's sound on matching days instead of playing on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub hour: i32,
    pub minute: i32,
    #[serde(default)]
    pub month: i32,
    #[serde(default)]
    pub day: i32,
    #[serde(default)]
    pub weekday: i32,
    #[serde(default)]
    pub is_alarm: bool,
    #[serde(default)]
    pub soundfile: String,
}

impl ScheduleEntry {
    /// An empty slot: midnight with every wildcard set. The engine's
    /// midnight guard keeps such slots from ever playing.
    pub fn empty() -> Self {
        Self {
            hour: 0,
            minute: 0,
            month: 0,
            day: 0,
            weekday: 0,
            is_alarm: false,
            soundfile: String::new(),
        }
    }

    fn weekday_matches(&self, now: &LocalTime) -> bool {
        self.weekday == now.weekday + 1
    }

    fn date_matches(&self, now: &LocalTime) -> bool {
        self.month == now.month + 1 && self.day == now.day
    }

    fn time_matches(&self, now: &LocalTime) -> bool {
        self.hour == now.hour && self.minute == now.minute
    }
}

/// The full schedule table with its fixed slot count enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScheduleTable(Vec<ScheduleEntry>);

impl ScheduleTable {
    /// Accept an externally supplied table. Anything but exactly
    /// [`SCHEDULE_SLOTS`] entries rejects the whole update so the prior
    /// table stays in effect.
    pub fn from_entries(entries: Vec<ScheduleEntry>) -> Result<Self, ClockError> {
        if entries.len() != SCHEDULE_SLOTS {
            return Err(ClockError::ScheduleFormat {
                expected: SCHEDULE_SLOTS,
                actual: entries.len(),
            });
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.0
    }

    /// Slot 0, the primary alarm. The slot always exists.
    pub fn primary(&self) -> &ScheduleEntry {
        &self.0[0]
    }

    pub fn primary_mut(&mut self) -> &mut ScheduleEntry {
        &mut self.0[0]
    }
}

impl Default for ScheduleTable {
    fn default() -> Self {
        let mut entries = vec![ScheduleEntry::empty(); SCHEDULE_SLOTS];
        entries[0] = ScheduleEntry {
            hour: 10,
            minute: 15,
            month: 0,
            day: 0,
            weekday: 0,
            is_alarm: true,
            soundfile: "bird1".into(),
        };
        Self(entries)
    }
}

impl<'de> Deserialize<'de> for ScheduleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<ScheduleEntry>::deserialize(deserializer)?;
        ScheduleTable::from_entries(entries).map_err(serde::de::Error::custom)
    }
}

/// User-editable alarm settings, persisted as one opaque blob through
/// the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSettings {
    /// Whether the primary alarm is armed.
    pub alarm_on: bool,
    /// When false, switching a sounding alarm off also disarms it.
    pub default_on: bool,
    /// Minutes one snooze press postpones the ring.
    pub snooze_minutes: u32,
    pub alarms: ScheduleTable,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            alarm_on: false,
            default_on: DEFAULT_ALARM_STAYS_ARMED,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            alarms: ScheduleTable::default(),
        }
    }
}

/// The next expected ring of the primary alarm.
///
/// Diverges from slot 0's configured time after a snooze. `None` means
/// no ring is pending; a fresh boot or a disarm lands here so a stale
/// table can never fire at midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlarm {
    pub hour: i32,
    pub minute: i32,
    pub sound: String,
}

impl PendingAlarm {
    /// Push the ring time forward, wrapping minute into hour and hour
    /// around midnight.
    pub fn advance_minutes(&mut self, minutes: u32) {
        self.minute += minutes as i32;
        if self.minute > 59 {
            self.minute -= 60;
            self.hour += 1;
            if self.hour > 23 {
                self.hour = 0;
            }
        }
    }
}

/// Mutable alarm state owned by the tick loop.
///
/// All mutation funnels through here: the rule engine replaces
/// `pending` each evaluated tick, and the snooze / disarm / adjust
/// operations below are applied between ticks. Methods return `true`
/// when the settings blob became dirty and should eventually be
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct AlarmState {
    pub settings: AlarmSettings,
    pub pending: Option<PendingAlarm>,
}

impl AlarmState {
    pub fn new(settings: AlarmSettings) -> Self {
        Self {
            settings,
            pending: None,
        }
    }

    /// Toggle the armed flag. Disarming also clears the pending ring.
    pub fn toggle_armed(&mut self) -> bool {
        if self.settings.alarm_on {
            self.settings.alarm_on = false;
            self.pending = None;
        } else {
            self.settings.alarm_on = true;
        }
        true
    }

    /// A sounding alarm was switched off. Clears the pending ring;
    /// unless `default_on` holds, the alarm is disarmed as well.
    pub fn alarm_off(&mut self) -> bool {
        self.pending = None;
        if !self.settings.default_on {
            self.settings.alarm_on = false;
            return true;
        }
        false
    }

    /// Postpone the pending ring by the configured snooze length.
    /// A snooze with nothing pending is a no-op.
    pub fn snooze(&mut self) {
        let minutes = self.settings.snooze_minutes;
        if let Some(pending) = self.pending.as_mut() {
            pending.advance_minutes(minutes);
        }
    }

    /// Manual alarm-time edit: move slot 0 by `delta_minutes`, wrapping
    /// around midnight in both directions. The front panel calls this
    /// with one [`crate::constants::ALARM_ADJUST_MINUTES`] step per
    /// encoder detent.
    pub fn adjust_primary(&mut self, delta_minutes: i32) -> bool {
        let entry = self.settings.alarms.primary_mut();
        let total = (entry.hour * 60 + entry.minute + delta_minutes).rem_euclid(24 * 60);
        entry.hour = total / 60;
        entry.minute = total % 60;
        true
    }

    /// Replace the whole schedule table; wrong entry counts reject the
    /// update and keep the prior table.
    pub fn replace_schedule(&mut self, entries: Vec<ScheduleEntry>) -> Result<(), ClockError> {
        self.settings.alarms = ScheduleTable::from_entries(entries)?;
        Ok(())
    }
}
