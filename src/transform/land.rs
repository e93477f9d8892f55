//! Land-characteristics entries → land fields.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Value, json};

use super::is_meaningful;
use crate::{domain::FieldMap, util::time::to_iso_millis};

/// One `<field>` element of the land response, tag name → text.
pub type LandField = HashMap<String, String>;

pub const LOT_ADDRESS: &str = "지번 주소";
pub const LAND_AREA: &str = "토지면적(㎡)";
pub const ZONING: &str = "용도지역";
pub const OFFICIAL_PRICE: &str = "공시지가(원/㎡)";
pub const LAND_UPDATED_AT: &str = "토지정보업데이트";

const UPDATED_AT_KEY: &str = "lastUpdtDt";

/// Picks the most recently updated entry.
///
/// A later entry replaces the current pick only when both timestamps parse
/// and the later one is strictly greater, so ties keep the first entry.
#[must_use]
pub fn select_latest(fields: &[LandField]) -> Option<&LandField> {
    let mut iter = fields.iter();
    let mut latest = iter.next()?;
    for candidate in iter {
        let newer = match (
            parse_timestamp(candidate.get(UPDATED_AT_KEY)),
            parse_timestamp(latest.get(UPDATED_AT_KEY)),
        ) {
            (Some(candidate_at), Some(latest_at)) => candidate_at > latest_at,
            _ => false,
        };
        if newer {
            latest = candidate;
        }
    }
    Some(latest)
}

fn parse_timestamp(raw: Option<&String>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Derives the display region ("강남구 역삼동") from a legal-dong name
/// such as "서울특별시 강남구 역삼동".
///
/// Special and metropolitan cities prefer the district, then the county.
/// Other provinces prefer the district when a city is present, then the
/// city, then the county. Returns `None` when no suffix token is found.
#[must_use]
pub fn display_region(legal_name: &str) -> Option<String> {
    let parts: Vec<&str> = legal_name.split_whitespace().collect();
    let last = parts.last()?;
    let find = |suffix: &str| parts.iter().find(|part| part.ends_with(suffix)).copied();

    let metropolitan = parts
        .iter()
        .any(|part| part.contains("특별시") || part.contains("광역시"));

    let unit = if metropolitan {
        find("구").or_else(|| find("군"))
    } else {
        match (find("시"), find("구")) {
            (Some(_), Some(gu)) => Some(gu),
            (Some(si), None) => Some(si),
            (None, _) => find("군"),
        }
    };

    unit.map(|unit| format!("{unit} {last}"))
}

fn parse_number(raw: Option<&String>) -> Option<f64> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Builds the normalized land fields from the selected entry.
#[must_use]
pub fn process(field: &LandField) -> FieldMap {
    let region = field
        .get("ldCodeNm")
        .and_then(|name| display_region(name))
        .unwrap_or_default();
    let lot = field.get("mnnmSlno").map_or("", String::as_str);

    let mut data = FieldMap::new();
    data.insert(LOT_ADDRESS.into(), json!(format!("{region} {lot}")));
    data.insert(
        LAND_AREA.into(),
        parse_number(field.get("lndpclAr")).map_or(Value::Null, |n| json!(n)),
    );
    data.insert(
        ZONING.into(),
        field
            .get("prposArea1Nm")
            .filter(|s| !s.is_empty())
            .map_or(Value::Null, |s| json!(s)),
    );
    data.insert(
        OFFICIAL_PRICE.into(),
        parse_number(field.get("pblntfPclnd")).map_or(Value::Null, |n| json!(n)),
    );
    data.insert(
        LAND_UPDATED_AT.into(),
        parse_timestamp(field.get(UPDATED_AT_KEY))
            .map_or(Value::Null, |at| json!(to_iso_millis(at))),
    );
    data
}

#[must_use]
pub fn has_meaningful_data(processed: &FieldMap) -> bool {
    [LAND_AREA, OFFICIAL_PRICE, ZONING]
        .iter()
        .any(|field| is_meaningful(processed.get(*field)))
}

/// Area, price and zoning are written only when present; nothing is cleared.
#[must_use]
pub fn update_fields(processed: &FieldMap) -> FieldMap {
    let mut fields = FieldMap::new();
    for name in [LAND_AREA, OFFICIAL_PRICE] {
        if let Some(value) = processed.get(name).filter(|v| v.is_number()) {
            fields.insert(name.into(), value.clone());
        }
    }
    if let Some(zoning) = processed
        .get(ZONING)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    {
        fields.insert(ZONING.into(), json!(zoning));
    }
    fields
}
