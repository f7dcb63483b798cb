//! Date/time helpers
//!
//! - `X-Sdk-Date` wire format (`YYYYMMDDTHHMMSSZ`, UTC): [`format_sdk_date`] / [`parse_sdk_date`]
//! - Serde helper for API timestamps, used as `#[serde(with = "datetime")]`:
//!   serializes `Option<DateTime<Utc>>` as RFC3339, deserializes RFC3339 strings
//!   or Unix timestamps (seconds or milliseconds)

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// `strftime` pattern of the `X-Sdk-Date` header.
pub const SDK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Exact length of a well-formed `X-Sdk-Date` value.
const SDK_DATE_LEN: usize = 16;

/// Format a timestamp for the `X-Sdk-Date` header.
pub fn format_sdk_date(dt: DateTime<Utc>) -> String {
    dt.format(SDK_DATE_FORMAT).to_string()
}

/// Parse an `X-Sdk-Date` value. Returns `None` unless the value is exactly
/// `YYYYMMDDTHHMMSSZ`.
pub fn parse_sdk_date(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != SDK_DATE_LEN || !s.is_ascii() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, SDK_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serialize `Option<DateTime<Utc>>` as an optional RFC3339 string.
#[allow(clippy::ref_option)]
pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

/// Deserialize an RFC3339 string or a Unix timestamp (seconds or milliseconds).
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Int(i64),
        Text(String),
    }

    match Option::<RawTimestamp>::deserialize(deserializer)? {
        Some(RawTimestamp::Text(s)) if s.is_empty() => Ok(None),
        Some(RawTimestamp::Text(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
        Some(RawTimestamp::Int(ts)) => parse_unix_timestamp(ts)
            .map(Some)
            .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
        None => Ok(None),
    }
}

/// Values above 10^11 are taken as milliseconds.
fn parse_unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}
