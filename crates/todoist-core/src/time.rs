//! Timestamps in the sync API's text format
//!
//! The API encodes instants as `"Mon 2 Jan 2006 15:04:05 -0700"` and uses
//! `null` for "no date". [`Time`] keeps that distinction as a zero value
//! instead of inventing a sentinel date.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Canonical wire layout
const LAYOUT: &str = "%a %-d %b %Y %H:%M:%S %z";

/// Display layout (local time)
const SHORT_LAYOUT: &str = "%Y-%m-%d(%a) %H:%M";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timestamp '{value}': {reason}")]
pub struct TimeError {
    pub value: String,
    pub reason: String,
}

/// An optional instant; the zero value means "unset"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Time(Option<DateTime<FixedOffset>>);

impl Time {
    /// The zero value
    pub const ZERO: Time = Time(None);

    pub fn new<Tz: TimeZone>(instant: DateTime<Tz>) -> Self {
        Time(Some(instant.fixed_offset()))
    }

    /// Current instant in UTC, truncated to whole seconds (the wire layout
    /// has no sub-second field)
    pub fn now() -> Self {
        let now = Utc::now();
        let secs = Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now);
        Time::new(secs)
    }

    /// Parse the canonical layout
    pub fn parse(value: &str) -> Result<Self, TimeError> {
        DateTime::parse_from_str(value, LAYOUT)
            .map(|dt| Time(Some(dt)))
            .map_err(|e| TimeError {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        self.0
    }

    /// Canonical text, `None` for the zero value
    pub fn to_canonical(&self) -> Option<String> {
        self.0.map(|dt| dt.format(LAYOUT).to_string())
    }

    /// Short local-time rendering for tables; empty for the zero value
    pub fn short_string(&self) -> String {
        match self.0 {
            Some(dt) => dt.with_timezone(&Local).format(SHORT_LAYOUT).to_string(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_canonical() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_canonical() {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Time::ZERO),
            Some(text) => Time::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}
