//! Lenient deserializers for backend timestamp and duration fields.
//!
//! The backend is not consistent: most timestamps are naive ISO-8601, some
//! are `%Y-%m-%d %H:%M:%S`, a few carry an offset, and alert rows use an
//! empty string for "unknown". Wait estimates arrive as integers or floats.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, de};

const SPACE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse any timestamp shape the backend emits. Offsets are converted to UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    s.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, SPACE_FORMAT))
        .ok()
}

pub(crate) fn timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub(crate) fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {s}"))),
    }
}

/// Whole seconds, rounding fractional values up so a wait never reads short.
pub(crate) fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let secs = v.ceil() as u64;
            Ok(Some(secs))
        }
        Some(v) => Err(de::Error::custom(format!("invalid duration: {v}"))),
    }
}

pub(crate) fn seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    optional_seconds(deserializer)?.ok_or_else(|| de::Error::custom("missing duration"))
}
