//! Timezone state: offsets, daylight transition rules, and the
//! UTC-to-local converter.
//!
//! A [`TimezoneInfo`] is rebuilt whenever the configured descriptor
//! string changes and is owned by the tick loop, which passes it
//! explicitly wherever a conversion is needed. The two transition
//! instants are cached per calendar year; the cache is a pure
//! optimization and is recomputed transparently whenever a conversion
//! asks about a different year.

pub mod calendar;
pub mod posix;

use crate::error::ClockError;
use self::calendar::{
    civil_from_secs, days_to_year, is_leap, year_in_range, DstFlag, LocalTime, UtcSeconds,
    DAYS_PER_WEEK, EPOCH_WEEKDAY, MONTH_LENGTHS, SECS_PER_DAY, SECS_PER_HOUR, SECS_PER_MIN,
};

/// Transitions default to 02:00:00 local time.
pub const DEFAULT_TRANSITION_TIME: i64 = 2 * SECS_PER_HOUR;

/// The day-of-year selector of one transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRule {
    /// `Jn`: day 1-365 counted as if February 29th did not exist, so a
    /// given number always names the same calendar date.
    JulianDay(u16),
    /// Bare `n`: zero-based day of year, leap day counted.
    DayOfYear(u16),
    /// `Mm.w.d`: the w-th weekday `d` of month `m` (week 5 meaning the
    /// last occurrence). Months 1-12, weekdays 0-6 with Sunday first.
    MonthWeekDay { month: u8, week: u8, weekday: u8 },
}

/// One of the two yearly offset changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub day: DayRule,
    /// Seconds after local midnight at which the change happens.
    pub time_of_day: i64,
    /// The UTC offset in effect on the approach to this transition,
    /// folded into `change` so it is already a UTC instant.
    pub utc_offset: i64,
    /// The UTC second of the change. Only valid for the cached year.
    pub change: UtcSeconds,
}

impl Default for TransitionRule {
    fn default() -> Self {
        Self {
            day: DayRule::DayOfYear(0),
            time_of_day: DEFAULT_TRANSITION_TIME,
            utc_offset: 0,
            change: 0,
        }
    }
}

impl TransitionRule {
    /// UTC instant of this transition in the given year.
    ///
    /// Pure function of the rule and the year; the caller has already
    /// checked the year is epoch-or-later.
    fn change_for_year(&self, year: i32) -> UtcSeconds {
        let year_days = days_to_year(year);
        let leap = is_leap(year);
        let table = &MONTH_LENGTHS[leap as usize];

        let days = match self.day {
            DayRule::JulianDay(day) => {
                let skip_leap_day = leap && day >= 60;
                year_days + i64::from(day) + i64::from(skip_leap_day) - 1
            }
            DayRule::DayOfYear(day) => year_days + i64::from(day),
            DayRule::MonthWeekDay {
                month,
                week,
                weekday,
            } => {
                let month = usize::from(month);
                let mut days = year_days;
                for len in table.iter().take(month - 1) {
                    days += i64::from(*len);
                }
                // Weekday of the 1st of the month, then the forward
                // distance to the requested weekday.
                let first_weekday = (EPOCH_WEEKDAY + days).rem_euclid(DAYS_PER_WEEK);
                let mut diff = i64::from(weekday) - first_weekday;
                if diff < 0 {
                    diff += DAYS_PER_WEEK;
                }
                let mut day_of_month = i64::from(week - 1) * DAYS_PER_WEEK + diff;
                // Week 5 means "last": back off while we overshoot the
                // month length.
                while day_of_month >= i64::from(table[month - 1]) {
                    day_of_month -= DAYS_PER_WEEK;
                }
                days + day_of_month
            }
        };

        days * SECS_PER_DAY + self.time_of_day + self.utc_offset
    }
}

/// Offsets and daylight rules for the configured timezone.
///
/// Offsets use the POSIX sign convention: positive west of Greenwich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneInfo {
    std_offset: i64,
    dst_offset: i64,
    rules: [TransitionRule; 2],
    cached_year: Option<i32>,
    /// True when the first rule fires earlier in the year than the
    /// second, i.e. daylight time is the inside interval of the pair.
    northern: bool,
}

impl TimezoneInfo {
    /// UTC, no daylight rule.
    pub fn utc() -> Self {
        Self::fixed(0)
    }

    /// A fixed offset with no daylight rule.
    pub fn fixed(std_offset: i64) -> Self {
        Self::with_rules(
            std_offset,
            std_offset,
            [TransitionRule::default(), TransitionRule::default()],
        )
    }

    pub(crate) fn with_rules(
        std_offset: i64,
        dst_offset: i64,
        rules: [TransitionRule; 2],
    ) -> Self {
        Self {
            std_offset,
            dst_offset,
            rules,
            cached_year: None,
            northern: true,
        }
    }

    /// Build from a POSIX descriptor string. On failure the caller keeps
    /// whatever timezone was active before.
    pub fn from_descriptor(descriptor: &str) -> Result<Self, ClockError> {
        posix::parse_descriptor(descriptor)
    }

    pub fn std_offset(&self) -> i64 {
        self.std_offset
    }

    pub fn dst_offset(&self) -> i64 {
        self.dst_offset
    }

    /// Equal offsets mean the daylight rules are never evaluated.
    pub fn has_dst(&self) -> bool {
        self.std_offset != self.dst_offset
    }

    pub fn rule(&self, index: usize) -> &TransitionRule {
        &self.rules[index]
    }

    /// Recompute both change instants for `year`.
    ///
    /// Idempotent, and the two rules are computed independently so the
    /// result does not depend on evaluation order. Years before the
    /// epoch cannot be computed.
    pub fn recompute_for_year(&mut self, year: i32) -> Result<(), ClockError> {
        if !year_in_range(year) {
            return Err(ClockError::Calendar(year));
        }
        for rule in &mut self.rules {
            rule.change = rule.change_for_year(year);
        }
        self.northern = self.rules[0].change < self.rules[1].change;
        self.cached_year = Some(year);
        Ok(())
    }

    /// The (start, end) change instants for `year`, recomputing the
    /// cache if needed.
    pub fn transition_pair(&mut self, year: i32) -> Result<(UtcSeconds, UtcSeconds), ClockError> {
        self.ensure_year(year)?;
        Ok((self.rules[0].change, self.rules[1].change))
    }

    fn ensure_year(&mut self, year: i32) -> Result<(), ClockError> {
        if self.cached_year == Some(year) {
            return Ok(());
        }
        self.recompute_for_year(year)
    }

    /// Convert a UTC instant to broken-down local time.
    ///
    /// Determines whether daylight time is in effect for the instant,
    /// then applies the matching offset with full borrow/carry
    /// propagation through day, month and year. When the year's rules
    /// cannot be computed the daylight flag is `Unknown` and only the
    /// standard offset is applied.
    pub fn to_local(&mut self, instant: UtcSeconds) -> LocalTime {
        let mut local = civil_from_secs(instant);

        local.dst = if !self.has_dst() {
            DstFlag::Off
        } else if self.ensure_year(local.year).is_ok() {
            let start = self.rules[0].change;
            let end = self.rules[1].change;
            let inside = if self.northern {
                instant >= start && instant < end
            } else {
                // Southern convention: the daylight interval wraps the
                // year boundary.
                instant >= start || instant < end
            };
            if inside { DstFlag::On } else { DstFlag::Off }
        } else {
            DstFlag::Unknown
        };

        let offset = if local.dst.is_on() {
            self.dst_offset
        } else {
            self.std_offset
        };
        apply_offset(&mut local, offset);
        local
    }
}

/// Subtract a POSIX offset from naive calendar fields, propagating
/// borrows and carries: second through minute, hour, day, month and
/// year, in both directions.
fn apply_offset(t: &mut LocalTime, offset: i64) {
    let hours = (offset / SECS_PER_HOUR) as i32;
    let sub_hour = offset % SECS_PER_HOUR;
    let minutes = (sub_hour / SECS_PER_MIN) as i32;
    let seconds = (sub_hour % SECS_PER_MIN) as i32;

    t.second -= seconds;
    t.minute -= minutes;
    t.hour -= hours;

    if t.second >= 60 {
        t.minute += 1;
        t.second -= 60;
    } else if t.second < 0 {
        t.minute -= 1;
        t.second += 60;
    }
    if t.minute >= 60 {
        t.hour += 1;
        t.minute -= 60;
    } else if t.minute < 0 {
        t.hour -= 1;
        t.minute += 60;
    }

    let table = &MONTH_LENGTHS[is_leap(t.year) as usize];
    if t.hour >= 24 {
        t.yday += 1;
        t.weekday = (t.weekday + 1) % 7;
        t.day += 1;
        t.hour -= 24;
        if t.day > table[t.month as usize] {
            t.day -= table[t.month as usize];
            t.month += 1;
            if t.month == 12 {
                t.month = 0;
                t.year += 1;
                t.yday = 0;
            }
        }
    } else if t.hour < 0 {
        t.yday -= 1;
        t.weekday -= 1;
        if t.weekday < 0 {
            t.weekday = 6;
        }
        t.day -= 1;
        t.hour += 24;
        if t.day == 0 {
            t.month -= 1;
            if t.month < 0 {
                t.month = 11;
                t.year -= 1;
                // Back onto December 31st of the prior year.
                t.yday = 364 + is_leap(t.year) as i32;
            }
            t.day = MONTH_LENGTHS[is_leap(t.year) as usize][t.month as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::calendar::secs_from_civil;

    const CET: &str = "CET-1CEST-2,M3.5.0/2,M10.5.0/3";

    #[test]
    fn cet_2021_transition_instants() {
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let (spring, fall) = tz.transition_pair(2021).unwrap();
        // Spring forward 2021-03-28T01:00:00Z, fall back 2021-10-31T01:00:00Z.
        assert_eq!(spring, secs_from_civil(2021, 2, 28, 1, 0, 0));
        assert_eq!(fall, secs_from_civil(2021, 9, 31, 1, 0, 0));
    }

    #[test]
    fn cet_2021_daylight_flag_around_boundaries() {
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let spring = secs_from_civil(2021, 2, 28, 1, 0, 0);
        let fall = secs_from_civil(2021, 9, 31, 1, 0, 0);

        assert_eq!(tz.to_local(spring - 1).dst, DstFlag::Off);
        assert_eq!(tz.to_local(spring + 1).dst, DstFlag::On);
        assert_eq!(tz.to_local(fall - 1).dst, DstFlag::On);
        assert_eq!(tz.to_local(fall + 1).dst, DstFlag::Off);
    }

    #[test]
    fn cet_applies_offsets_across_the_spring_boundary() {
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let spring = secs_from_civil(2021, 2, 28, 1, 0, 0);

        let before = tz.to_local(spring - 1);
        assert_eq!((before.hour, before.minute, before.second), (1, 59, 59));

        // The wall clock jumps from 02:00 to 03:00.
        let after = tz.to_local(spring);
        assert_eq!((after.hour, after.minute, after.second), (3, 0, 0));
    }

    #[test]
    fn southern_hemisphere_interval_wraps_the_year() {
        // Sydney: daylight time from October into April.
        let mut tz =
            TimezoneInfo::from_descriptor("AEST-10AEDT,M10.1.0,M4.1.0/3").unwrap();

        let january = secs_from_civil(2021, 0, 15, 0, 0, 0);
        let june = secs_from_civil(2021, 5, 15, 0, 0, 0);
        let december = secs_from_civil(2021, 11, 15, 0, 0, 0);

        assert_eq!(tz.to_local(january).dst, DstFlag::On);
        assert_eq!(tz.to_local(june).dst, DstFlag::Off);
        assert_eq!(tz.to_local(december).dst, DstFlag::On);
    }

    #[test]
    fn pre_epoch_year_reports_unknown_and_standard_offset() {
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let t = tz.to_local(secs_from_civil(1965, 5, 1, 12, 0, 0));
        assert_eq!(t.dst, DstFlag::Unknown);
        // Standard offset only: CET is UTC+1.
        assert_eq!(t.hour, 13);
    }

    #[test]
    fn negative_offset_borrows_into_prior_year() {
        // A west-of-Greenwich zone early on January 1st lands on
        // December 31st of the prior year.
        let mut tz = TimezoneInfo::from_descriptor("EST5").unwrap();
        let t = tz.to_local(secs_from_civil(1971, 0, 1, 3, 0, 0));
        assert_eq!((t.year, t.month, t.day), (1970, 11, 31));
        assert_eq!(t.hour, 22);
        assert_eq!(t.yday, 364);
        assert_eq!(t.weekday, 4);
    }

    #[test]
    fn positive_offset_carries_into_next_year() {
        // UTC+14 (Line Islands style): late Dec 31 UTC is already Jan 1.
        let mut tz = TimezoneInfo::from_descriptor("LINT-14").unwrap();
        let t = tz.to_local(secs_from_civil(2023, 11, 31, 12, 0, 0));
        assert_eq!((t.year, t.month, t.day), (2024, 0, 1));
        assert_eq!(t.hour, 2);
        assert_eq!(t.yday, 0);
    }

    #[test]
    fn leap_day_conversion() {
        let mut tz = TimezoneInfo::utc();
        let t = tz.to_local(secs_from_civil(2024, 1, 29, 12, 0, 0));
        assert_eq!((t.month, t.day), (1, 29));
        let next = tz.to_local(secs_from_civil(2024, 1, 29, 12, 0, 0) + SECS_PER_DAY);
        assert_eq!((next.month, next.day), (2, 1));
    }

    #[test]
    fn recompute_is_idempotent_and_order_independent() {
        let mut a = TimezoneInfo::from_descriptor(CET).unwrap();
        let mut b = a.clone();

        a.recompute_for_year(2021).unwrap();
        a.recompute_for_year(2021).unwrap();
        b.recompute_for_year(2030).unwrap();
        b.recompute_for_year(2021).unwrap();

        assert_eq!(a.rule(0).change, b.rule(0).change);
        assert_eq!(a.rule(1).change, b.rule(1).change);
    }

    #[test]
    fn cache_refreshes_when_the_year_changes() {
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let summer_2021 = tz.to_local(secs_from_civil(2021, 6, 1, 12, 0, 0));
        assert_eq!(summer_2021.dst, DstFlag::On);
        let summer_2025 = tz.to_local(secs_from_civil(2025, 6, 1, 12, 0, 0));
        assert_eq!(summer_2025.dst, DstFlag::On);
        let winter_2021 = tz.to_local(secs_from_civil(2021, 0, 1, 12, 0, 0));
        assert_eq!(winter_2021.dst, DstFlag::Off);
    }

    #[test]
    fn julian_day_rule_skips_leap_day() {
        // J60 is March 1st in any year.
        let mut tz = TimezoneInfo::from_descriptor("AAA0BBB,J60/0,J300/0").unwrap();
        let (start, _) = tz.transition_pair(2024).unwrap();
        assert_eq!(start, secs_from_civil(2024, 2, 1, 0, 0, 0));
        let (start, _) = tz.transition_pair(2023).unwrap();
        assert_eq!(start, secs_from_civil(2023, 2, 1, 0, 0, 0));
    }

    #[test]
    fn day_of_year_rule_counts_leap_day() {
        // Day 60 (zero-based) is March 1st only in common years.
        let mut tz = TimezoneInfo::from_descriptor("AAA0BBB,60/0,300/0").unwrap();
        let (start, _) = tz.transition_pair(2023).unwrap();
        assert_eq!(start, secs_from_civil(2023, 2, 2, 0, 0, 0));
        let (start, _) = tz.transition_pair(2024).unwrap();
        assert_eq!(start, secs_from_civil(2024, 2, 1, 0, 0, 0));
    }

    #[test]
    fn last_week_rule_backs_into_the_month() {
        // Last Sunday of October 2021 is the 31st; of 2022 the 30th.
        let mut tz = TimezoneInfo::from_descriptor(CET).unwrap();
        let (_, fall_2021) = tz.transition_pair(2021).unwrap();
        assert_eq!(fall_2021, secs_from_civil(2021, 9, 31, 1, 0, 0));
        let (_, fall_2022) = tz.transition_pair(2022).unwrap();
        assert_eq!(fall_2022, secs_from_civil(2022, 9, 30, 1, 0, 0));
    }
}
