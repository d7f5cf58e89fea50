//! Wire payloads and records for the schedule endpoints.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ScheduleId;

/// Resource type binding a schedule to an autostopping rule.
pub(crate) const AUTOSTOP_RULE_RESOURCE_TYPE: &str = "autostop_rule";

/// Time of day with minute precision, serialized as `{hour, min}`.
///
/// Constructible from both upstream forms: `"HH:MM"` strings and bare hour
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    #[serde(rename = "min")]
    pub minute: u8,
}

#[derive(Error, Debug)]
pub enum TimeOfDayError {
    #[error("invalid time `{0}`, expected 24h `HH:MM`")]
    Format(String),

    #[error("time component out of range in `{0}`")]
    OutOfRange(String),
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TimeOfDayError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayError::OutOfRange(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Bare-hour form, minute zero.
    pub fn on_the_hour(hour: u8) -> Result<Self, TimeOfDayError> {
        Self::new(hour, 0)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| TimeOfDayError::Format(s.to_string()))?;
        let hour = hour
            .parse()
            .map_err(|_| TimeOfDayError::Format(s.to_string()))?;
        let minute = minute
            .parse()
            .map_err(|_| TimeOfDayError::Format(s.to_string()))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Create-schedule request body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateScheduleRequest {
    pub schedule: SchedulePayload,
}

#[derive(Debug, Serialize)]
pub(crate) struct SchedulePayload {
    pub name: String,
    pub account_id: String,
    pub description: String,
    pub resources: Vec<ScheduleResource>,
    pub details: ScheduleDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResource {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDetails {
    pub timezone: String,
    pub uptime: UptimeWindow,
}

/// A single uptime window covering a set of weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeWindow {
    pub days: UptimeDays,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeDays {
    /// Weekday numbers, 0=Sunday..6=Saturday.
    pub days: Vec<u8>,
    pub all_day: bool,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

/// A schedule as returned by the vendor.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScheduleRecord {
    pub id: ScheduleId,
    #[serde(default)]
    pub name: String,
}
