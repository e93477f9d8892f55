//! Pure mapping from registry payloads to normalized record fields.

pub mod building;
pub mod land;

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::util::time::to_iso_millis;

const ALL_ZERO_DATE: &str = "00000000";

/// Integer-prefix parse of a sub-count; anything unparsable counts as zero.
#[must_use]
pub(crate) fn parse_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => leading_integer(text).unwrap_or(0),
        _ => 0,
    }
}

fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Reformats a compact `YYYYMMDD` date into an ISO instant at midnight UTC.
///
/// All-zero, wrong-length and non-calendar values come back unchanged.
#[must_use]
pub fn format_compact_date(raw: &str) -> String {
    if raw.len() != 8 || raw == ALL_ZERO_DATE {
        return raw.to_string();
    }
    match NaiveDate::parse_from_str(raw, "%Y%m%d") {
        Ok(date) => to_iso_millis(date.and_time(NaiveTime::MIN).and_utc()),
        Err(_) => raw.to_string(),
    }
}

/// Loose truthiness used to decide whether a field carries real data.
#[must_use]
pub(crate) fn is_meaningful(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Array(_) | Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}
