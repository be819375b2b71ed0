//! Canonical date range keys.
//!
//! A [`Daterange`] is an inclusive pair of UTC instants with second precision.
//! Its string form is two fixed-width RFC 3339 timestamps joined by `_`:
//!
//! ```text
//! 2019-01-01T00:00:00+00:00_2019-02-01T00:00:00+00:00
//! ```
//!
//! The encoding is zero padded, so lexical order of keys matches
//! chronological order of ranges, and neither timestamp contains `/` or `_`,
//! so the key can be embedded as a path component of an object-store key.

use crate::error::{AerisError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the start and end timestamps.
pub const SEPARATOR: char = '_';

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";
const MAX_YEAR: i32 = 9999;

/// An inclusive `[start, end]` range of UTC instants.
///
/// Ordering is by start, then end, and agrees with the ordering of the
/// encoded strings.
///
/// # Examples
///
/// ```rust,ignore
/// use alopex_aeris::Daterange;
///
/// let range: Daterange = "2019-01-01T00:00:00+00:00_2019-02-01T00:00:00+00:00".parse()?;
/// assert_eq!(range.to_string().parse::<Daterange>()?, range);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Daterange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Daterange {
    /// Creates a range, truncating both ends to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Validation` if `start > end` or either year falls
    /// outside `0000..=9999`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let start = truncate(start)?;
        let end = truncate(end)?;
        if start > end {
            return Err(AerisError::validation(format!(
                "daterange start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Creates a range from epoch seconds.
    pub fn from_timestamps(start: i64, end: i64) -> Result<Self> {
        Self::new(instant_from_secs(start)?, instant_from_secs(end)?)
    }

    /// Decodes the daterange component at the end of a segment key such as
    /// `data/uuid/{id}/v1/{daterange}`.
    pub fn from_key(key: &str) -> Result<Self> {
        let component = key.rsplit('/').next().unwrap_or(key);
        decode(key, component)
    }

    /// Start of the range.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the range (inclusive).
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the range.
    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Returns true if the ranges share at least one instant.
    pub fn overlaps(&self, other: &Daterange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns true if `other` lies fully inside this range.
    pub fn contains(&self, other: &Daterange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns true if `instant` lies inside this range.
    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &Daterange) -> Daterange {
        Daterange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Hull of an iterator of ranges, or `None` if it is empty.
    pub fn hull<'a>(ranges: impl IntoIterator<Item = &'a Daterange>) -> Option<Daterange> {
        ranges
            .into_iter()
            .fold(None, |acc: Option<Daterange>, r| {
                Some(acc.map_or(*r, |a| a.union(r)))
            })
    }
}

impl fmt::Display for Daterange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.start.format(TIMESTAMP_FORMAT),
            SEPARATOR,
            self.end.format(TIMESTAMP_FORMAT)
        )
    }
}

impl FromStr for Daterange {
    type Err = AerisError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s, s)
    }
}

impl Serialize for Daterange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Daterange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn decode(key: &str, encoded: &str) -> Result<Daterange> {
    let mut parts = encoded.split(SEPARATOR);
    let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AerisError::format(
            key,
            "expected exactly two timestamps separated by '_'",
        ));
    };

    let start = decode_timestamp(key, start)?;
    let end = decode_timestamp(key, end)?;
    if start > end {
        return Err(AerisError::format(key, "start is after end"));
    }

    Ok(Daterange { start, end })
}

fn decode_timestamp(key: &str, part: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(part)
        .map_err(|e| AerisError::format(key, format!("{part}: {e}")))?
        .with_timezone(&Utc);
    if parsed.nanosecond() != 0 {
        return Err(AerisError::format(key, format!("{part}: sub-second precision")));
    }
    Ok(parsed)
}

fn truncate(instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if !(0..=MAX_YEAR).contains(&instant.year()) {
        return Err(AerisError::validation(format!(
            "year {} outside 0000..=9999",
            instant.year()
        )));
    }
    instant
        .with_nanosecond(0)
        .ok_or_else(|| AerisError::validation(format!("cannot truncate {instant}")))
}

/// Converts epoch seconds to a UTC instant.
pub fn instant_from_secs(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AerisError::validation(format!("timestamp {secs} out of range")))
}

/// Parses a caller-supplied date or date-time string as a UTC instant.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Naive values are taken to be UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(AerisError::validation(format!(
        "cannot parse date/time '{value}'"
    )))
}
