//! The once-per-tick alarm and scheduled-sound decision.
//!
//! Evaluation is a pure function of the schedule table, the current
//! local time and the pending alarm; it returns the playback decision
//! together with the next pending alarm. The tick loop applies the
//! result, so nothing here mutates shared state mid-scan.
//!
//! Ticks land just past :00 and :30. Only the :00 tick may match, which
//! the sub-ten-second gate below enforces; combined with the
//! minute-granularity match this bounds the primary alarm to at most
//! one ring per minute boundary.

use super::{PendingAlarm, ScheduleTable};
use crate::tz::calendar::LocalTime;

/// What the tick should do about sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmDecision {
    /// The primary alarm rings: start looping playback.
    Fired { sound: String },
    /// An ancillary slot matched: play once, no looping.
    Ancillary { sound: String },
    /// Nothing to play this tick.
    Nothing,
}

/// Outcome of one evaluation: the decision plus the pending alarm to
/// carry into the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: AlarmDecision,
    pub pending: Option<PendingAlarm>,
}

/// How strongly an ancillary candidate matched. A better class wins
/// over any earlier slot; within a class the lowest slot wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchClass {
    Wildcard,
    Date,
    Weekday,
}

/// Evaluate the schedule for one tick.
pub fn evaluate(
    table: &ScheduleTable,
    now: &LocalTime,
    pending: Option<&PendingAlarm>,
    armed: bool,
) -> Evaluation {
    // Only the tick right after the minute boundary may match.
    if now.second > 9 {
        return Evaluation {
            decision: AlarmDecision::Nothing,
            pending: pending.cloned(),
        };
    }

    let mut next = pending.cloned();
    let mut primary_found = false;
    let mut ancillary: Option<(MatchClass, usize)> = None;

    for (index, entry) in table.entries().iter().enumerate() {
        if entry.time_matches(now) {
            if index == 0 {
                // Slot 0 is the primary alarm by construction; its raw
                // time re-arms the pending ring every time it comes by.
                primary_found = true;
                next = Some(PendingAlarm {
                    hour: now.hour,
                    minute: now.minute,
                    sound: entry.soundfile.clone(),
                });
            } else if !primary_found && !entry.is_alarm {
                let class = if entry.weekday_matches(now) {
                    Some(MatchClass::Weekday)
                } else if entry.date_matches(now) {
                    Some(MatchClass::Date)
                } else if entry.weekday == 0
                    && entry.month == 0
                    && !(entry.hour == 0 && entry.minute == 0)
                {
                    // Unconstrained slot: allowed, except the exact
                    // (0, 0) pair so an unconfigured slot never chimes
                    // at midnight.
                    Some(MatchClass::Wildcard)
                } else {
                    None
                };

                if let Some(class) = class
                    && ancillary.is_none_or(|(best, _)| class > best)
                {
                    ancillary = Some((class, index));
                }
            }
        }

        // Sound substitution: once the primary matched, any other
        // alarm-flagged slot whose weekday or date matches today swaps
        // the ring sound without duplicating the alarm time.
        if primary_found
            && index > 0
            && entry.is_alarm
            && (entry.weekday_matches(now) || entry.date_matches(now))
            && let Some(pending) = next.as_mut()
        {
            pending.sound = entry.soundfile.clone();
        }
    }

    let decision = match (next.as_ref(), ancillary) {
        (Some(pending), _) if armed && pending.hour == now.hour && pending.minute == now.minute => {
            AlarmDecision::Fired {
                sound: pending.sound.clone(),
            }
        }
        (_, Some((_, index))) => AlarmDecision::Ancillary {
            sound: table.entries()[index].soundfile.clone(),
        },
        _ => AlarmDecision::Nothing,
    };

    Evaluation {
        decision,
        pending: next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{ScheduleEntry, ScheduleTable};
    use crate::constants::SCHEDULE_SLOTS;
    use crate::tz::calendar::{DstFlag, LocalTime};

    fn at(hour: i32, minute: i32, second: i32, weekday: i32) -> LocalTime {
        LocalTime {
            year: 2021,
            month: 5, // June
            day: 15,
            hour,
            minute,
            second,
            weekday,
            yday: 165,
            dst: DstFlag::Off,
        }
    }

    fn table_with(entries: Vec<(usize, ScheduleEntry)>) -> ScheduleTable {
        let mut slots = vec![ScheduleEntry::empty(); SCHEDULE_SLOTS];
        for (index, entry) in entries {
            slots[index] = entry;
        }
        ScheduleTable::from_entries(slots).unwrap()
    }

    fn primary(hour: i32, minute: i32, sound: &str) -> ScheduleEntry {
        ScheduleEntry {
            hour,
            minute,
            month: 0,
            day: 0,
            weekday: 0,
            is_alarm: true,
            soundfile: sound.into(),
        }
    }

    #[test]
    fn nothing_outside_the_minute_window() {
        let table = table_with(vec![(0, primary(7, 0, "bird1"))]);
        let eval = evaluate(&table, &at(7, 0, 30, 2), None, true);
        assert_eq!(eval.decision, AlarmDecision::Nothing);
    }

    #[test]
    fn primary_fires_looping_over_matching_ancillary() {
        // A weekday chime at the alarm time must lose to the alarm.
        let chime = ScheduleEntry {
            hour: 7,
            minute: 0,
            month: 0,
            day: 0,
            weekday: 3, // Tuesday
            is_alarm: false,
            soundfile: "chime".into(),
        };
        let table = table_with(vec![(0, primary(7, 0, "bird1")), (1, chime)]);

        // Tuesday 07:00:02.
        let eval = evaluate(&table, &at(7, 0, 2, 2), None, true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Fired {
                sound: "bird1".into()
            }
        );
        let pending = eval.pending.unwrap();
        assert_eq!((pending.hour, pending.minute), (7, 0));
    }

    #[test]
    fn disarmed_primary_does_not_fire_but_pending_updates() {
        let table = table_with(vec![(0, primary(7, 0, "bird1"))]);
        let eval = evaluate(&table, &at(7, 0, 2, 2), None, false);
        assert_eq!(eval.decision, AlarmDecision::Nothing);
        assert!(eval.pending.is_some());
    }

    #[test]
    fn weekday_match_beats_date_match_regardless_of_slot_order() {
        let date_sound = ScheduleEntry {
            hour: 9,
            minute: 30,
            month: 6, // June 15th
            day: 15,
            weekday: 0,
            is_alarm: false,
            soundfile: "date".into(),
        };
        let weekday_sound = ScheduleEntry {
            hour: 9,
            minute: 30,
            month: 0,
            day: 0,
            weekday: 3, // Tuesday
            is_alarm: false,
            soundfile: "weekday".into(),
        };
        // Date entry sits in the earlier slot.
        let table = table_with(vec![
            (0, primary(7, 0, "bird1")),
            (1, date_sound),
            (2, weekday_sound),
        ]);

        let eval = evaluate(&table, &at(9, 30, 1, 2), None, true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Ancillary {
                sound: "weekday".into()
            }
        );
    }

    #[test]
    fn unconstrained_slot_plays_except_at_midnight() {
        let mut hourly = ScheduleEntry {
            hour: 12,
            minute: 0,
            month: 0,
            day: 0,
            weekday: 0,
            is_alarm: false,
            soundfile: "cuckoo".into(),
        };
        let table = table_with(vec![(0, primary(7, 0, "bird1")), (5, hourly.clone())]);
        let eval = evaluate(&table, &at(12, 0, 3, 4), None, true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Ancillary {
                sound: "cuckoo".into()
            }
        );

        // The same slot anchored at 00:00 must stay silent.
        hourly.hour = 0;
        let table = table_with(vec![(0, primary(7, 0, "bird1")), (5, hourly)]);
        let eval = evaluate(&table, &at(0, 0, 3, 4), None, true);
        assert_eq!(eval.decision, AlarmDecision::Nothing);
    }

    #[test]
    fn alarm_flagged_slot_substitutes_the_ring_sound() {
        // Weekend slot: same alarm, different sound on Saturdays, with
        // no time of its own.
        let weekend = ScheduleEntry {
            hour: 0,
            minute: 0,
            month: 0,
            day: 0,
            weekday: 7, // Saturday
            is_alarm: true,
            soundfile: "weekend".into(),
        };
        let table = table_with(vec![(0, primary(7, 0, "bird1")), (3, weekend)]);

        // Saturday 07:00.
        let eval = evaluate(&table, &at(7, 0, 2, 6), None, true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Fired {
                sound: "weekend".into()
            }
        );

        // Sunday 07:00 keeps the configured sound.
        let eval = evaluate(&table, &at(7, 0, 2, 0), None, true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Fired {
                sound: "bird1".into()
            }
        );
    }

    #[test]
    fn snoozed_pending_fires_away_from_the_slot_time() {
        let table = table_with(vec![(0, primary(7, 0, "bird1"))]);
        let pending = PendingAlarm {
            hour: 7,
            minute: 5,
            sound: "bird1".into(),
        };

        // At 07:05 slot 0 does not match, the snoozed pending does.
        let eval = evaluate(&table, &at(7, 5, 2, 2), Some(&pending), true);
        assert_eq!(
            eval.decision,
            AlarmDecision::Fired {
                sound: "bird1".into()
            }
        );
    }

    #[test]
    fn no_pending_no_match_is_silent() {
        let table = table_with(vec![(0, primary(7, 0, "bird1"))]);
        let eval = evaluate(&table, &at(8, 0, 2, 2), None, true);
        assert_eq!(eval.decision, AlarmDecision::Nothing);
        assert!(eval.pending.is_none());
    }
}
