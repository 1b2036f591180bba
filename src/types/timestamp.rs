//! Point-in-time values as stored in notification records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A UTC instant at which an update happened or a session last checked in.
///
/// Serializes as an RFC 3339 string. Deserialization also accepts integer or
/// fractional epoch seconds, which older writers stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Wrap a `chrono` UTC instant.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// The current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Whole seconds since the Unix epoch. `None` if out of range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }

    /// Fractional seconds since the Unix epoch. `None` if out of range or not finite.
    pub fn from_unix_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos).map(Self)
    }

    /// The underlying `chrono` value.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Every encoding a stored timestamp has been written in.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Secs(i64),
    Fractional(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Secs(secs) => Timestamp::from_unix_secs(secs)
                .ok_or_else(|| D::Error::custom(format!("epoch seconds out of range: {secs}"))),
            RawTimestamp::Fractional(secs) => Timestamp::from_unix_secs_f64(secs)
                .ok_or_else(|| D::Error::custom(format!("epoch seconds out of range: {secs}"))),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|at| Timestamp(at.with_timezone(&Utc)))
                .map_err(|e| D::Error::custom(format!("invalid timestamp '{text}': {e}"))),
        }
    }
}
