//! Recurring feed schedules.

use chrono::{NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A time of day in 24-hour `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    /// Create a time of day, validating the ranges.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 {
            return Err(Error::invalid_parameter("hour", hour));
        }
        if minute > 59 {
            return Err(Error::invalid_parameter("minute", minute));
        }
        Ok(Self { hour, minute })
    }

    /// Hour of day (0-23).
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute of hour (0-59).
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Whether the wall-clock time `now` falls within this minute.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.hour as u32 && now.minute() == self.minute as u32
    }
}

impl FromStr for ScheduleTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_parameter("time", s);

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;

        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ScheduleTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ScheduleTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A daily feed of `kg` kilograms at `time`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedSchedule {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Amount of feed to dispense in kilograms.
    pub kg: f64,
    /// Time of day to dispense.
    pub time: ScheduleTime,
}

impl FeedSchedule {
    /// Create a schedule, rejecting non-positive amounts.
    pub fn new(id: i64, kg: f64, time: ScheduleTime) -> Result<Self> {
        validate_kg(kg)?;
        Ok(Self { id, kg, time })
    }

    /// Whether this schedule is due at `now`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.time.matches(now)
    }
}

/// Partial update for a schedule. `None` keeps the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScheduleUpdate {
    /// New amount in kilograms.
    pub kg: Option<f64>,
    /// New time of day.
    pub time: Option<ScheduleTime>,
}

pub(crate) fn validate_kg(kg: f64) -> Result<()> {
    if kg.is_finite() && kg > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter("kg", kg))
    }
}
