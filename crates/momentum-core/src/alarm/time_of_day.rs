//! Wall-clock alarm time and next-trigger computation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A time of day with minute resolution, stored as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeOfDay(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 7, minute: 0 }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Next instant at which `time` occurs, strictly after `now`.
///
/// The same-day instant (seconds zeroed) is used when it is still ahead;
/// otherwise it is pushed exactly 24 hours later. A time equal to `now`
/// counts as passed.
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, time: TimeOfDay) -> DateTime<Tz> {
    let tz = now.timezone();
    let naive = now
        .date_naive()
        .and_hms_opt(u32::from(time.hour), u32::from(time.minute), 0);

    // A local time that falls into a DST gap is moved one hour forward.
    let candidate = naive.and_then(|naive| {
        tz.from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
    });

    match candidate {
        Some(at) if at > *now => at,
        Some(at) => at + Duration::hours(24),
        None => now.clone() + Duration::hours(24),
    }
}
