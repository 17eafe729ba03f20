//! POSIX timezone descriptor parsing.
//!
//! Descriptors look like `CET-1CEST-2,M3.5.0/2,M10.5.0/3`: a standard
//! name and offset, an optional daylight name with optional offset, and
//! an optional pair of transition rules. Offsets follow the POSIX sign
//! convention (positive west of Greenwich), magnitudes parse as
//! `hh[:mm[:ss]]`. Parsing is all-or-nothing: a malformed descriptor
//! leaves the caller's previously active timezone untouched.

use crate::error::ClockError;
use crate::tz::calendar::{SECS_PER_HOUR, SECS_PER_MIN};
use crate::tz::{DayRule, TransitionRule, TimezoneInfo, DEFAULT_TRANSITION_TIME};

/// Longest zone name accepted, matching the common libc limit.
const MAX_NAME_LEN: usize = 10;

/// Parse a full descriptor into a fresh [`TimezoneInfo`].
///
/// An empty descriptor yields UTC with no daylight rule. When a daylight
/// name is present without an explicit offset, daylight time defaults to
/// one hour ahead of standard. When the rule pair is missing entirely,
/// the post-2007 US pair (second Sunday of March, first Sunday of
/// November, both at 02:00:00) is assumed.
pub fn parse_descriptor(descriptor: &str) -> Result<TimezoneInfo, ClockError> {
    let fail = |reason: &'static str| ClockError::Parse {
        descriptor: descriptor.to_string(),
        reason,
    };

    let mut scan = Scanner::new(descriptor);
    // Implementation-specific form marker, ignored.
    scan.eat(b':');

    if scan.at_end() {
        return Ok(TimezoneInfo::utc());
    }

    if scan.name().is_empty() {
        return Err(fail("missing standard zone name"));
    }

    let std_offset = scan
        .signed_offset()
        .ok_or_else(|| fail("missing standard offset"))?;

    if scan.name().is_empty() {
        // No daylight name: fixed offset year-round.
        return Ok(TimezoneInfo::fixed(std_offset));
    }

    // Explicit daylight offset, or the conventional one hour ahead.
    let dst_offset = scan.signed_offset().unwrap_or(std_offset - SECS_PER_HOUR);

    let mut rules = [TransitionRule::default(), TransitionRule::default()];
    for (index, rule) in rules.iter_mut().enumerate() {
        scan.eat(b',');

        rule.day = match scan.peek() {
            Some(b'M') => {
                scan.bump();
                let month = scan.number().ok_or_else(|| fail("malformed month"))?;
                if !scan.eat(b'.') {
                    return Err(fail("malformed month rule"));
                }
                let week = scan.number().ok_or_else(|| fail("malformed week"))?;
                if !scan.eat(b'.') {
                    return Err(fail("malformed month rule"));
                }
                let weekday = scan.number().ok_or_else(|| fail("malformed weekday"))?;
                if !(1..=12).contains(&month) {
                    return Err(fail("month outside 1-12"));
                }
                if !(1..=5).contains(&week) {
                    return Err(fail("week outside 1-5"));
                }
                if weekday > 6 {
                    return Err(fail("weekday outside 0-6"));
                }
                DayRule::MonthWeekDay {
                    month: month as u8,
                    week: week as u8,
                    weekday: weekday as u8,
                }
            }
            Some(b'J') => {
                scan.bump();
                let day = scan.number().ok_or_else(|| fail("malformed Julian day"))?;
                if !(1..=365).contains(&day) {
                    return Err(fail("Julian day outside 1-365"));
                }
                DayRule::JulianDay(day as u16)
            }
            Some(b'0'..=b'9') => {
                let day = scan.number().ok_or_else(|| fail("malformed day-of-year"))?;
                if day > 365 {
                    return Err(fail("day-of-year outside 0-365"));
                }
                DayRule::DayOfYear(day as u16)
            }
            _ => {
                // Rule pair absent: fall back to the US defaults.
                if index == 0 {
                    DayRule::MonthWeekDay {
                        month: 3,
                        week: 2,
                        weekday: 0,
                    }
                } else {
                    DayRule::MonthWeekDay {
                        month: 11,
                        week: 1,
                        weekday: 0,
                    }
                }
            }
        };

        rule.time_of_day = if scan.eat(b'/') {
            scan.offset_magnitude()
                .ok_or_else(|| fail("malformed transition time"))?
        } else {
            DEFAULT_TRANSITION_TIME
        };
    }

    // Each rule carries its own offset so the change instant can be
    // expressed directly in UTC.
    rules[0].utc_offset = std_offset;
    rules[1].utc_offset = dst_offset;

    Ok(TimezoneInfo::with_rules(std_offset, dst_offset, rules))
}

/// Minimal byte scanner over the descriptor string.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a zone name: up to ten bytes that are neither digits nor
    /// any of `,`, `+`, `-`. Returns the consumed slice (may be empty).
    fn name(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos - start < MAX_NAME_LEN {
            match self.peek() {
                Some(b) if !b.is_ascii_digit() && b != b',' && b != b'+' && b != b'-' => {
                    self.bump();
                }
                _ => break,
            }
        }
        &self.bytes[start..self.pos]
    }

    /// Consume an unsigned decimal number.
    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b @ b'0'..=b'9') = self.peek() {
            value = value.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
            self.bump();
        }
        if self.pos == start { None } else { Some(value) }
    }

    /// Consume `hh[:mm[:ss]]` into seconds. Hours are required; minutes
    /// and seconds default to zero.
    fn offset_magnitude(&mut self) -> Option<i64> {
        let hours = i64::from(self.number()?);
        let mut minutes = 0;
        let mut seconds = 0;
        if self.eat(b':') {
            minutes = i64::from(self.number()?);
            if self.eat(b':') {
                seconds = i64::from(self.number()?);
            }
        }
        Some(hours * SECS_PER_HOUR + minutes * SECS_PER_MIN + seconds)
    }

    /// Consume an optionally signed offset. A leading `-` negates the
    /// magnitude; a bare or `+`-prefixed magnitude is positive.
    fn signed_offset(&mut self) -> Option<i64> {
        let negative = if self.eat(b'-') {
            true
        } else {
            self.eat(b'+');
            false
        };
        let magnitude = self.offset_magnitude()?;
        Some(if negative { -magnitude } else { magnitude })
    }
}
