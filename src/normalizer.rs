//! History record normalization
//!
//! Converts raw records from the history feed into [`Reading`]s. Records
//! carry their time either as a numeric `timestamp` (epoch milliseconds) or
//! as a `time` string; anything else is dropped with a diagnostic.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::models::{Parameter, Reading};

/// Date-time layouts without an offset, interpreted in local time
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y, %I:%M:%S %p",
    "%b %d, %Y %H:%M:%S",
];

/// Date-only layouts, interpreted as local midnight
const LOCAL_DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

/// Result of normalizing one history snapshot
#[derive(Debug, Default)]
pub struct Normalized {
    pub readings: Vec<Reading>,
    pub rejected: usize,
}

/// Normalize a single raw record.
pub fn normalize_record(raw: &Value, offset: &FixedOffset) -> Result<Reading, IngestError> {
    let record = raw.as_object().ok_or(IngestError::NotAnObject)?;
    let timestamp = resolve_timestamp(record, offset)?;

    let mut reading = Reading::at(timestamp);
    for parameter in Parameter::ALL {
        if let Some(value) = measurement(record, parameter) {
            reading = reading.with(parameter, value);
        }
    }

    Ok(reading)
}

/// Normalize a full history snapshot, keeping arrival order.
///
/// The snapshot may be a JSON array or an object keyed by child id, in
/// which case children are taken in the store's key order (see
/// [`store_key_order`]). Only the last `limit` raw records are considered.
/// Rejected records are logged and skipped.
pub fn normalize_snapshot(raw: &Value, limit: usize, offset: &FixedOffset) -> Normalized {
    let children: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| store_key_order(a, b));
            entries.into_iter().map(|(_, child)| child).collect()
        }
        Value::Null => Vec::new(),
        other => {
            warn!(kind = %json_kind(other), "History snapshot is neither an array nor an object");
            Vec::new()
        }
    };

    let skip = children.len().saturating_sub(limit);
    let mut out = Normalized::default();

    for child in children.into_iter().skip(skip) {
        match normalize_record(child, offset) {
            Ok(reading) => out.readings.push(reading),
            Err(e) => {
                warn!(error = %e, record = %child, "Dropping history record");
                out.rejected += 1;
            }
        }
    }

    debug!(
        accepted = out.readings.len(),
        rejected = out.rejected,
        "History snapshot normalized"
    );

    out
}

/// Child ordering used by the remote store.
///
/// Keys that are canonical 32-bit integers come first, in numeric order;
/// all other keys follow in lexicographic order. Push ids are
/// chronological strings, so this is arrival order.
pub fn store_key_order(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn integer_key(key: &str) -> Option<i32> {
    key.parse::<i32>()
        .ok()
        .filter(|n| n.to_string() == key)
}

/// Parse a calendar date-time string into epoch milliseconds.
///
/// Strings with an explicit offset (RFC 3339, RFC 2822) are absolute. ISO
/// date-only strings (`2026-01-05`) are UTC midnight; every other layout
/// without an offset is read in the supplied local offset.
pub fn parse_time(text: &str, offset: &FixedOffset) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|ndt| Utc.from_utc_datetime(&ndt).timestamp_millis());
    }

    let naive = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            LOCAL_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

fn resolve_timestamp(record: &Map<String, Value>, offset: &FixedOffset) -> Result<i64, IngestError> {
    if let Some(millis) = record.get("timestamp").and_then(numeric_millis) {
        if DateTime::<Utc>::from_timestamp_millis(millis).is_none() {
            return Err(IngestError::TimestampOutOfRange(millis));
        }
        return Ok(millis);
    }

    match record.get("time") {
        Some(Value::String(text)) => parse_time(text, offset)
            .filter(|millis| DateTime::<Utc>::from_timestamp_millis(*millis).is_some())
            .ok_or_else(|| IngestError::UnparsableTime(text.clone())),
        _ => Err(IngestError::MissingTimestamp),
    }
}

/// Numeric timestamp, truncated to whole milliseconds. Zero counts as absent.
fn numeric_millis(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(millis) = number.as_i64() {
        return (millis != 0).then_some(millis);
    }

    let float = number.as_f64()?;
    if !float.is_finite() || float == 0.0 || float.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(float.trunc() as i64)
}

fn measurement(record: &Map<String, Value>, parameter: Parameter) -> Option<f64> {
    let value = match parameter {
        Parameter::DissolvedOxygen => record
            .get("do")
            .or_else(|| record.get("dissolvedOxygen")),
        other => record.get(other.key()),
    }?;

    value.as_f64().filter(|v| v.is_finite())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use serde_json::json;

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[test]
    fn test_numeric_timestamp_used_verbatim() {
        let raw = json!({ "timestamp": 1_767_571_200_000_i64, "temperature": 25.0, "ph": 7.8 });
        let reading = normalize_record(&raw, &utc()).unwrap();

        assert_eq!(reading.timestamp, 1_767_571_200_000);
        assert_eq!(reading.temperature, Some(25.0));
        assert_eq!(reading.ph, Some(7.8));
        assert_eq!(reading.salinity, None);
    }

    #[test]
    fn test_time_string_parsed() {
        let raw = json!({ "time": "2026-01-05T10:30:00Z", "do": 6.4 });
        let reading = normalize_record(&raw, &utc()).unwrap();

        let expected = Utc.with_ymd_and_hms(2026, 1, 5, 10, 30, 0).unwrap();
        assert_eq!(reading.timestamp, expected.timestamp_millis());
        assert_eq!(reading.dissolved_oxygen, Some(6.4));
    }

    #[test]
    fn test_numeric_timestamp_wins_over_time() {
        let raw = json!({ "timestamp": 42_000, "time": "2026-01-05T10:30:00Z" });
        assert_eq!(normalize_record(&raw, &utc()).unwrap().timestamp, 42_000);
    }

    #[test]
    fn test_zero_timestamp_falls_back_to_time() {
        let raw = json!({ "timestamp": 0, "time": "2026-01-05T00:00:00Z" });
        let reading = normalize_record(&raw, &utc()).unwrap();
        assert_ne!(reading.timestamp, 0);
    }

    #[test]
    fn test_string_timestamp_is_not_numeric() {
        let raw = json!({ "timestamp": "1767571200000" });
        assert_eq!(
            normalize_record(&raw, &utc()),
            Err(IngestError::MissingTimestamp)
        );
    }

    #[test]
    fn test_unparsable_time_rejected() {
        let raw = json!({ "time": "not-a-date", "temperature": 25.0 });
        assert_eq!(
            normalize_record(&raw, &utc()),
            Err(IngestError::UnparsableTime("not-a-date".to_string()))
        );
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        let raw = json!({ "temperature": 25.0 });
        assert_eq!(
            normalize_record(&raw, &utc()),
            Err(IngestError::MissingTimestamp)
        );
        assert_eq!(
            normalize_record(&json!(17), &utc()),
            Err(IngestError::NotAnObject)
        );
    }

    #[test]
    fn test_out_of_range_timestamp_rejected() {
        let raw = json!({ "timestamp": i64::MAX });
        assert_eq!(
            normalize_record(&raw, &utc()),
            Err(IngestError::TimestampOutOfRange(i64::MAX))
        );
    }

    #[test]
    fn test_fractional_timestamp_truncated() {
        let raw = json!({ "timestamp": 1500.75 });
        assert_eq!(normalize_record(&raw, &utc()).unwrap().timestamp, 1500);
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let raw = json!({ "timestamp": 1000, "humidity": 40.0, "ph": "7.1" });
        let reading = normalize_record(&raw, &utc()).unwrap();
        assert_eq!(reading, Reading::at(1000));
    }

    #[test]
    fn test_local_time_uses_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let millis = parse_time("2026-01-05 01:00:00", &plus_two).unwrap();

        let expected = Utc.with_ymd_and_hms(2026, 1, 4, 23, 0, 0).unwrap();
        assert_eq!(millis, expected.timestamp_millis());
    }

    #[test]
    fn test_iso_date_only_is_utc_midnight() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let millis = parse_time("2026-01-05", &plus_two).unwrap();

        let expected = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(millis, expected.timestamp_millis());
    }

    #[test]
    fn test_display_formats_parse() {
        assert!(parse_time("Jan 05, 2026", &utc()).is_some());
        assert!(parse_time("1/5/2026, 3:04:05 PM", &utc()).is_some());
        assert!(parse_time("Mon, 05 Jan 2026 10:00:00 +0000", &utc()).is_some());
        assert!(parse_time("", &utc()).is_none());
        assert!(parse_time("2026-13-45", &utc()).is_none());
    }

    #[test]
    fn test_snapshot_drops_invalid_records() {
        let raw = json!([
            { "timestamp": 1000, "temperature": 25.0 },
            { "time": "not-a-date" },
            { "salinity": 30.0 },
            { "time": "2026-01-06T00:00:00Z", "temperature": 31.0 }
        ]);

        let out = normalize_snapshot(&raw, 500, &utc());

        assert_eq!(out.readings.len(), 2);
        assert_eq!(out.rejected, 2);
        assert_eq!(out.readings[0].timestamp, 1000);
    }

    #[test]
    fn test_snapshot_object_keeps_key_order() {
        let raw = json!({
            "-a1": { "timestamp": 3000 },
            "-a2": { "timestamp": 1000 },
            "-a3": { "timestamp": 2000 }
        });

        let out = normalize_snapshot(&raw, 500, &utc());
        let stamps: Vec<i64> = out.readings.iter().map(|r| r.timestamp).collect();

        assert_eq!(stamps, vec![3000, 1000, 2000]);
    }

    #[test]
    fn test_snapshot_object_numeric_keys_in_numeric_order() {
        let raw = json!({
            "10": { "timestamp": 10_000 },
            "9": { "timestamp": 9_000 },
            "2": { "timestamp": 2_000 }
        });

        let all = normalize_snapshot(&raw, 500, &utc());
        let stamps: Vec<i64> = all.readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![2_000, 9_000, 10_000]);

        let last = normalize_snapshot(&raw, 1, &utc());
        assert_eq!(last.readings.len(), 1);
        assert_eq!(last.readings[0].timestamp, 10_000);
    }

    #[test]
    fn test_store_key_order() {
        assert_eq!(store_key_order("9", "10"), Ordering::Less);
        assert_eq!(store_key_order("10", "-a1"), Ordering::Less);
        assert_eq!(store_key_order("-a2", "-a10"), Ordering::Greater);
        // leading zero is not a canonical integer key
        assert_eq!(store_key_order("007", "8"), Ordering::Greater);
    }

    #[test]
    fn test_snapshot_keeps_last_records_only() {
        let records: Vec<Value> = (1..=8).map(|i| json!({ "timestamp": i * 1000 })).collect();
        let out = normalize_snapshot(&Value::Array(records), 5, &utc());

        assert_eq!(out.readings.len(), 5);
        assert_eq!(out.readings[0].timestamp, 4000);
        assert_eq!(out.readings[4].timestamp, 8000);
    }

    #[test]
    fn test_snapshot_never_grows() {
        let raw = json!([{ "timestamp": 1 }, { "time": 5 }, null, { "timestamp": 2 }]);
        let out = normalize_snapshot(&raw, 500, &utc());

        assert!(out.readings.len() <= 4);
        assert_eq!(out.readings.len() + out.rejected, 4);
        assert!(normalize_snapshot(&Value::Null, 500, &utc()).readings.is_empty());
    }
}
