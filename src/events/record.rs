use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Unrecognized event time '{0}'")]
pub struct TimeParseError(pub String);

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// A point in time as stored by the web application.
///
/// Rows written with an offset keep it. Rows without one are wall-clock
/// times and get the calendar's time zone attached by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Zoned(DateTime<FixedOffset>),
    Floating(NaiveDateTime),
}

impl EventTime {
    pub fn parse(value: &str) -> Result<Self, TimeParseError> {
        let trimmed = value.trim();

        if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(EventTime::Zoned(zoned));
        }
        // sqlite datetime columns use a space separator
        if let Ok(zoned) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Ok(EventTime::Zoned(zoned));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(EventTime::Floating)
            .ok_or_else(|| TimeParseError(value.to_string()))
    }

    pub fn to_api_string(&self) -> String {
        match self {
            EventTime::Zoned(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            EventTime::Floating(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub first_name: String,
    pub last_name: String,
}

impl Attendee {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub event_type: String,
    pub description: String,
    pub start_time: EventTime,
    pub end_time: EventTime,
    pub rsvp_limit: Option<u32>,
    pub rsvps: Vec<Attendee>,
}

impl EventRecord {
    pub fn rsvp_names(&self) -> Vec<String> {
        self.rsvps.iter().map(Attendee::full_name).collect()
    }
}
