//! Wiki timestamps.
//!
//! The wiki stores dates as a 17-digit UTC string, `YYYYMMDDHHMMSSmmm`.
//! Older content sometimes omits the milliseconds, so 14-digit values are
//! accepted on input and always written back in the 17-digit form.

use crate::Error;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const WIRE_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// A millisecond-precision UTC timestamp in the wiki's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WikiTimestamp(DateTime<Utc>);

impl WikiTimestamp {
    /// Creates a timestamp at the current time, truncated to milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Wraps a chrono datetime, dropping sub-millisecond precision.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let millis = dt.nanosecond() / 1_000_000 * 1_000_000;
        Self(dt.with_nanosecond(millis).unwrap_or(dt))
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Result<Self, Error> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Self)
            .ok_or_else(|| Error::InvalidTimestamp(millis.to_string()))
    }

    /// Returns milliseconds since the Unix epoch.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the underlying chrono datetime.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parses the wiki's compact form (14 or 17 digits).
    pub fn parse(s: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidTimestamp(s.to_string());

        if !(s.len() == 14 || s.len() == 17) || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let num = |range: std::ops::Range<usize>| -> Result<u32, Error> {
            s[range].parse::<u32>().map_err(|_| invalid())
        };

        let year = i32::try_from(num(0..4)?).map_err(|_| invalid())?;
        let (month, day) = (num(4..6)?, num(6..8)?);
        let (hour, minute, second) = (num(8..10)?, num(10..12)?, num(12..14)?);
        let millis = if s.len() == 17 { num(14..17)? } else { 0 };

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
            .ok_or_else(invalid)?;

        Ok(Self(Utc.from_utc_datetime(&naive)))
    }
}

impl fmt::Display for WikiTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WIRE_FORMAT))
    }
}

impl FromStr for WikiTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for WikiTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WikiTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
