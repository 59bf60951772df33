//! Epoch seconds to and from broken-down calendar fields
//!
//! Proleptic Gregorian calendar in UTC, computed by hand: no timezone
//! database is consulted and local time is the same as UTC.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::common::errno::{EINVAL, EOVERFLOW};

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86400;

/// Days in any run of 400 consecutive Gregorian years
const DAYS_PER_400_YEARS: i64 = 146_097;

/// Weekday index of 1970-01-01 (a Thursday)
const EPOCH_WEEKDAY: i64 = 4;

const EPOCH_YEAR: i64 = 1970;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("month {0} is outside 1 to 12")]
    InvalidMonth(u32),
    #[error("time is outside the representable range")]
    OutOfRange,
}

impl TimeError {
    pub fn errno(&self) -> i32 {
        match self {
            TimeError::InvalidMonth(_) => EINVAL,
            TimeError::OutOfRange => EOVERFLOW,
        }
    }
}

/// Broken-down time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarFields {
    /// Full year (1970, not 70)
    pub year: i64,
    /// 1 to 12
    pub month: u32,
    /// 1 to 31
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// 0 = Sunday
    pub weekday: u32,
    /// 0 = 1st January
    pub yearday: u32,
    /// Daylight saving in effect (adds an hour in `fields_to_epoch`)
    pub dst: bool,
}

impl CalendarFields {
    /// Fields for a date and time, with weekday and yearday derived
    pub fn from_ymd_hms(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self, TimeError> {
        let fields = CalendarFields {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday: 0,
            yearday: 0,
            dst: false,
        };
        Ok(epoch_to_fields(fields_to_epoch(&fields)?))
    }

    /// Abbreviated weekday name
    pub fn weekday_abbrev(&self) -> &'static str {
        &self.weekday_name()[..3]
    }

    pub fn weekday_name(&self) -> &'static str {
        WEEKDAY_NAMES[self.weekday as usize % 7]
    }

    /// Abbreviated month name
    pub fn month_abbrev(&self) -> &'static str {
        &self.month_name()[..3]
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month as usize + 11) % 12]
    }
}

impl Display for CalendarFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Divisible by 4 and not by 100, or divisible by 400
pub fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i64) -> i64 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Length of `month` (1 to 12) in `year`
pub fn days_in_month(year: i64, month: u32) -> Result<u32, TimeError> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Ok(31),
        4 | 6 | 9 | 11 => Ok(30),
        2 if is_leap_year(year) => Ok(29),
        2 => Ok(28),
        _ => Err(TimeError::InvalidMonth(month)),
    }
}

/// Days from 1st January of `year` to the start of `month`
fn days_before_month(year: i64, month: u32) -> Result<i64, TimeError> {
    let mut days = 0;
    for m in 1..month {
        days += days_in_month(year, m)? as i64;
    }
    Ok(days)
}

/// Broken-down UTC time for seconds since 1970-01-01T00:00:00
///
/// Whole 400-year cycles are removed first, then the remaining years
/// and months are stepped through one at a time.
pub fn epoch_to_fields(seconds: i64) -> CalendarFields {
    let mut days = seconds.div_euclid(SECONDS_PER_DAY);
    let time = seconds.rem_euclid(SECONDS_PER_DAY);
    let weekday = (days + EPOCH_WEEKDAY).rem_euclid(7);

    let cycles = days.div_euclid(DAYS_PER_400_YEARS);
    days -= cycles * DAYS_PER_400_YEARS;
    let mut year = EPOCH_YEAR + cycles * 400;

    while days >= days_in_year(year) {
        days -= days_in_year(year);
        year += 1;
    }
    let yearday = days;

    let mut month = 1;
    loop {
        let length = days_in_month(year, month).unwrap_or(31) as i64;
        if days < length || month == 12 {
            break;
        }
        days -= length;
        month += 1;
    }

    CalendarFields {
        year,
        month,
        day: days as u32 + 1,
        hour: (time / SECONDS_PER_HOUR) as u32,
        minute: (time % SECONDS_PER_HOUR / SECONDS_PER_MINUTE) as u32,
        second: (time % SECONDS_PER_MINUTE) as u32,
        weekday: weekday as u32,
        yearday: yearday as u32,
        dst: false,
    }
}

/// Seconds since the epoch for `fields`
///
/// Day and time fields are applied linearly without normalisation, so
/// an out of range day simply lands in a neighbouring month. Weekday
/// and yearday are ignored.
pub fn fields_to_epoch(fields: &CalendarFields) -> Result<i64, TimeError> {
    if !(1..=12).contains(&fields.month) {
        return Err(TimeError::InvalidMonth(fields.month));
    }

    let years = fields
        .year
        .checked_sub(EPOCH_YEAR)
        .ok_or(TimeError::OutOfRange)?;
    let cycles = years.div_euclid(400);
    let mut days = cycles
        .checked_mul(DAYS_PER_400_YEARS)
        .ok_or(TimeError::OutOfRange)?;
    let cycle_start = EPOCH_YEAR + cycles * 400;
    for year in cycle_start..fields.year {
        days = days
            .checked_add(days_in_year(year))
            .ok_or(TimeError::OutOfRange)?;
    }

    days = days
        .checked_add(days_before_month(fields.year, fields.month)?)
        .and_then(|d| d.checked_add(fields.day as i64 - 1))
        .ok_or(TimeError::OutOfRange)?;

    let time = fields.hour as i64 * SECONDS_PER_HOUR
        + fields.minute as i64 * SECONDS_PER_MINUTE
        + fields.second as i64
        + if fields.dst { SECONDS_PER_HOUR } else { 0 };

    days.checked_mul(SECONDS_PER_DAY)
        .and_then(|s| s.checked_add(time))
        .ok_or(TimeError::OutOfRange)
}

/// Broken-down UTC time
pub fn gmtime(seconds: i64) -> CalendarFields {
    epoch_to_fields(seconds)
}

/// Broken-down local time; there is no timezone database so this is
/// UTC
pub fn localtime(seconds: i64) -> CalendarFields {
    epoch_to_fields(seconds)
}

/// Inverse of `localtime`
pub fn mktime(fields: &CalendarFields) -> Result<i64, TimeError> {
    fields_to_epoch(fields)
}
