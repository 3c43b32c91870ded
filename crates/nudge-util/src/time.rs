//! Time utilities for nudge
//!
//! Provides the `TimeOfDay` wall-clock type used for reminder and quiet-hour
//! settings, the circular `[start, end)` window test, and a `now()` source.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `NUDGE_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising quiet hours and date rollover without waiting for them.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 21:30:00`)
//!
//! Example:
//! ```bash
//! NUDGE_MOCK_TIME="2025-12-25 21:30:00" nudged run
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::MalformedTimeError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "NUDGE_MOCK_TIME";

/// Minutes in a day; the modulus of the circular clock
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        ),
                    },
                    Err(_) => tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    ),
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// A 24-hour wall-clock time with minute precision, written `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `H:MM` or `HH:MM`.
    ///
    /// The string must split on `:` into exactly two purely numeric parts;
    /// the hour part has one or two digits, the minute part exactly two.
    pub fn parse(s: &str) -> Result<Self, MalformedTimeError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(MalformedTimeError::new(s, "expected HH:MM format"));
        }

        let (hour_str, minute_str) = (parts[0], parts[1]);
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());

        if !all_digits(hour_str) || hour_str.len() > 2 {
            return Err(MalformedTimeError::new(s, "invalid hour"));
        }
        if !all_digits(minute_str) || minute_str.len() != 2 {
            return Err(MalformedTimeError::new(s, "invalid minute"));
        }

        let hour: u8 = hour_str
            .parse()
            .map_err(|_| MalformedTimeError::new(s, "invalid hour"))?;
        let minute: u8 = minute_str
            .parse()
            .map_err(|_| MalformedTimeError::new(s, "invalid minute"))?;

        if hour >= 24 {
            return Err(MalformedTimeError::new(s, "hour must be 0-23"));
        }
        if minute >= 60 {
            return Err(MalformedTimeError::new(s, "minute must be 0-59"));
        }

        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_from_midnight(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    /// Build from minutes since midnight, wrapping past 24h
    pub fn from_minutes(minutes: u16) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Time of day of a local instant, truncated to the minute
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self::from_naive_time(dt.time())
    }

    /// Whether this time lies in the half-open window `[start, end)` on a circular clock.
    ///
    /// `start < end` is a same-day window, `start > end` spans midnight, and
    /// `start == end` is empty.
    pub fn is_within(&self, start: TimeOfDay, end: TimeOfDay) -> bool {
        if start <= end {
            *self >= start && *self < end
        } else {
            // Window crosses midnight (e.g., 22:00 - 07:00)
            *self >= start || *self < end
        }
    }

    /// Halfway point walking forward from `self` to `other` on the circular clock.
    ///
    /// Equal inputs yield `self`.
    pub fn midpoint_towards(&self, other: TimeOfDay) -> TimeOfDay {
        let from = self.minutes_from_midnight();
        let span = (other.minutes_from_midnight() + MINUTES_PER_DAY - from) % MINUTES_PER_DAY;
        TimeOfDay::from_minutes(from + span / 2)
    }

    /// This time on the given local date.
    ///
    /// Returns `None` when the time does not exist on that date (DST gap).
    pub fn on(&self, date: NaiveDate) -> Option<DateTime<Local>> {
        date.and_time(self.to_naive_time())
            .and_local_timezone(Local)
            .earliest()
    }

    /// The first occurrence of this time strictly after `now` (today or tomorrow)
    pub fn next_occurrence(&self, now: &DateTime<Local>) -> Option<DateTime<Local>> {
        let today = now.date_naive();
        match self.on(today) {
            Some(dt) if dt > *now => Some(dt),
            _ => self.on(today.succ_opt()?),
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = MalformedTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = MalformedTimeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// Days of the week mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const MONDAY: u8 = 1 << 0;
    pub const TUESDAY: u8 = 1 << 1;
    pub const WEDNESDAY: u8 = 1 << 2;
    pub const THURSDAY: u8 = 1 << 3;
    pub const FRIDAY: u8 = 1 << 4;
    pub const SATURDAY: u8 = 1 << 5;
    pub const SUNDAY: u8 = 1 << 6;

    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(
        Self::MONDAY | Self::TUESDAY | Self::WEDNESDAY | Self::THURSDAY | Self::FRIDAY,
    );
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(Self::SATURDAY | Self::SUNDAY);
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0x7F);
    pub const NONE: DaysOfWeek = DaysOfWeek(0);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0x7F)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        let bit = match weekday {
            Weekday::Mon => Self::MONDAY,
            Weekday::Tue => Self::TUESDAY,
            Weekday::Wed => Self::WEDNESDAY,
            Weekday::Thu => Self::THURSDAY,
            Weekday::Fri => Self::FRIDAY,
            Weekday::Sat => Self::SATURDAY,
            Weekday::Sun => Self::SUNDAY,
        };
        (self.0 & bit) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
