//! Recurring sync vocabulary
//!
//! A document has at most one recurring sync. Its shape is one of three
//! frequencies, each with its own parameters:
//!
//! | Frequency | `time`            | `time2`     |
//! |-----------|-------------------|-------------|
//! | hourly    | interval in hours | unused      |
//! | daily     | hour of day       | unused      |
//! | weekly    | weekday name      | hour of day |
//!
//! Stored values are parsed back through `Recurrence::from_parts`, which
//! rejects anything outside these sets instead of substituting a default.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Intervals accepted for hourly recurrence
pub const HOURLY_INTERVALS: [u8; 6] = [1, 2, 4, 6, 8, 12];

/// Human-readable one-hour windows, indexed by hour of day
const HOUR_RANGES: [&str; 24] = [
    "Midnight to 1am",
    "1am to 2am",
    "2am to 3am",
    "3am to 4am",
    "4am to 5am",
    "5am to 6am",
    "6am to 7am",
    "7am to 8am",
    "8am to 9am",
    "9am to 10am",
    "10am to 11am",
    "11am to noon",
    "noon to 1pm",
    "1pm to 2pm",
    "2pm to 3pm",
    "3pm to 4pm",
    "4pm to 5pm",
    "5pm to 6pm",
    "6pm to 7pm",
    "7pm to 8pm",
    "8pm to 9pm",
    "9pm to 10pm",
    "10pm to 11pm",
    "11pm to midnight",
];

// ============================================================================
// Frequency
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(SyncError::InvalidSchedule(format!(
                "unknown frequency '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Hour of day
// ============================================================================

/// An hour of the day, 0..=23
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HourOfDay(u8);

impl TryFrom<u8> for HourOfDay {
    type Error = String;

    fn try_from(hour: u8) -> Result<Self, Self::Error> {
        Self::new(hour).ok_or_else(|| format!("hour of day out of range: {hour}"))
    }
}

impl From<HourOfDay> for u8 {
    fn from(hour: HourOfDay) -> Self {
        hour.0
    }
}

impl HourOfDay {
    pub fn new(hour: u8) -> Option<Self> {
        (hour < 24).then_some(Self(hour))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One-hour window text, e.g. "2am to 3am"
    pub fn range_text(self) -> &'static str {
        HOUR_RANGES[self.0 as usize]
    }

    fn parse(value: &str) -> Result<Self, SyncError> {
        value
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| SyncError::InvalidSchedule(format!("invalid hour of day '{value}'")))
    }
}

// ============================================================================
// Hourly interval
// ============================================================================

/// Hours between runs of an hourly recurrence, one of `HOURLY_INTERVALS`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HourInterval(u8);

impl TryFrom<u8> for HourInterval {
    type Error = String;

    fn try_from(hours: u8) -> Result<Self, Self::Error> {
        Self::new(hours).ok_or_else(|| format!("unsupported hourly interval: {hours}"))
    }
}

impl From<HourInterval> for u8 {
    fn from(interval: HourInterval) -> Self {
        interval.0
    }
}

impl HourInterval {
    pub fn new(hours: u8) -> Option<Self> {
        HOURLY_INTERVALS.contains(&hours).then_some(Self(hours))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn parse(value: &str) -> Result<Self, SyncError> {
        value
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| SyncError::InvalidSchedule(format!("invalid hourly interval '{value}'")))
    }
}

// ============================================================================
// Weekday
// ============================================================================

/// Parse one of the seven upper-case weekday names
pub fn parse_weekday(name: &str) -> Result<Weekday, SyncError> {
    match name {
        "MONDAY" => Ok(Weekday::Mon),
        "TUESDAY" => Ok(Weekday::Tue),
        "WEDNESDAY" => Ok(Weekday::Wed),
        "THURSDAY" => Ok(Weekday::Thu),
        "FRIDAY" => Ok(Weekday::Fri),
        "SATURDAY" => Ok(Weekday::Sat),
        "SUNDAY" => Ok(Weekday::Sun),
        other => Err(SyncError::InvalidSchedule(format!(
            "unknown weekday '{other}'"
        ))),
    }
}

/// Upper-case weekday name as stored and shown
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

// ============================================================================
// Recurrence
// ============================================================================

/// Parameters of the document's recurring sync job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum Recurrence {
    /// Every `every_hours` hours
    Hourly { every_hours: HourInterval },
    /// Once a day within the `at_hour` window
    Daily { at_hour: HourOfDay },
    /// Once a week on `on`, within the `at_hour` window
    Weekly { on: Weekday, at_hour: HourOfDay },
}

impl Recurrence {
    /// Parse the raw `(frequency, time, time2)` triple used by the schedule
    /// dialog and the stored properties.
    pub fn from_parts(frequency: &str, time: &str, time2: Option<&str>) -> Result<Self, SyncError> {
        match frequency.parse::<Frequency>()? {
            Frequency::Hourly => Ok(Recurrence::Hourly {
                every_hours: HourInterval::parse(time)?,
            }),
            Frequency::Daily => Ok(Recurrence::Daily {
                at_hour: HourOfDay::parse(time)?,
            }),
            Frequency::Weekly => {
                let on = parse_weekday(time)?;
                let hour = time2.ok_or_else(|| {
                    SyncError::InvalidSchedule("weekly schedule needs an hour of day".into())
                })?;
                Ok(Recurrence::Weekly {
                    on,
                    at_hour: HourOfDay::parse(hour)?,
                })
            }
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Recurrence::Hourly { .. } => Frequency::Hourly,
            Recurrence::Daily { .. } => Frequency::Daily,
            Recurrence::Weekly { .. } => Frequency::Weekly,
        }
    }

    /// Stored form of `time`
    pub fn time_value(&self) -> String {
        match self {
            Recurrence::Hourly { every_hours } => every_hours.get().to_string(),
            Recurrence::Daily { at_hour } => at_hour.get().to_string(),
            Recurrence::Weekly { on, .. } => weekday_name(*on).to_string(),
        }
    }

    /// Stored form of `time2`; only weekly uses it
    pub fn time2_value(&self) -> Option<String> {
        match self {
            Recurrence::Weekly { at_hour, .. } => Some(at_hour.get().to_string()),
            _ => None,
        }
    }

    /// Sentence fragment, e.g. "Weekly on MONDAY between 2am to 3am"
    pub fn describe(&self) -> String {
        match self {
            Recurrence::Hourly { every_hours } => format!("Every {} Hours", every_hours.get()),
            Recurrence::Daily { at_hour } => format!("Daily between {}", at_hour.range_text()),
            Recurrence::Weekly { on, at_hour } => format!(
                "Weekly on {} between {}",
                weekday_name(*on),
                at_hour.range_text()
            ),
        }
    }
}
