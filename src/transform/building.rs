//! Building-registry title records → building fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};

use super::{format_compact_date, is_meaningful, parse_count};
use crate::domain::FieldMap;

pub const ELEVATOR_COUNT: &str = "승강기수";
pub const PARKING_COUNT: &str = "주차대수";
pub const HOUSEHOLD_SUMMARY: &str = "세대/가구/호";
pub const FLOOR_SUMMARY: &str = "층수";

const DATE_FIELDS: [&str; 2] = ["crtnDay", "useAprDay"];
const ELEVATOR_PARTS: [&str; 2] = ["rideUseElvtCnt", "emgenUseElvtCnt"];
const PARKING_PARTS: [&str; 4] = [
    "indrMechUtcnt",
    "oudrMechUtcnt",
    "indrAutoUtcnt",
    "oudrAutoUtcnt",
];

/// Registry short code → normalized field name.
pub const FIELD_NAMES: &[(&str, &str)] = &[
    ("rnum", "순번"),
    ("platPlc", "지번 주소"),
    ("sigunguCd", "시군구코드"),
    ("bjdongCd", "법정동코드"),
    ("bun", "번"),
    ("ji", "지"),
    ("mainPurpsCdNm", "주용도"),
    ("etcPurps", "기타용도"),
    ("roofCdNm", "지붕"),
    ("heit", "높이(m)"),
    ("useAprDay", "사용승인일"),
    ("crtnDay", "생성일자"),
    ("newPlatPlc", "도로명주소"),
    ("platGbCd", "대지"),
    ("bldNm", "건물명"),
    ("platArea", "대지면적(㎡)"),
    ("archArea", "건축면적(㎡)"),
    ("bcRat", "건폐율(%)"),
    ("totArea", "연면적(㎡)"),
    ("vlRatEstmTotArea", "용적률산정용연면적(㎡)"),
    ("vlRat", "용적률(%)"),
    ("strctCdNm", "주구조"),
];

/// Fields written back to the building table.
pub const UPDATE_FIELDS: &[&str] = &[
    "대지면적(㎡)",
    "연면적(㎡)",
    "용적률산정용연면적(㎡)",
    "건축면적(㎡)",
    "건폐율(%)",
    "용적률(%)",
    "높이(m)",
    PARKING_COUNT,
    ELEVATOR_COUNT,
    "도로명주소",
    "생성일자",
    APPROVAL_DATE,
    FLOOR_SUMMARY,
    "기타용도",
    "주용도",
    "지붕",
    "주구조",
    "건물명",
    HOUSEHOLD_SUMMARY,
];

const APPROVAL_DATE: &str = "사용승인일";

/// At least one of these must be populated for a record to count as found.
const MEANINGFUL_FIELDS: [&str; 4] = ["대지면적(㎡)", "연면적(㎡)", "주용도", "도로명주소"];

static LEADING_REGION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+\s").expect("valid region regex"));

/// Pulls the title items out of a registry response.
///
/// Returns an empty list for the degraded sentinel payload, a missing
/// `items` node, or an empty item list.
#[must_use]
pub fn extract_items(payload: &Value) -> Vec<Map<String, Value>> {
    let Some(item) = payload.pointer("/response/body/items/item") else {
        return Vec::new();
    };
    let items = match item {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![item.clone()],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut map) => {
                if let Some(Value::String(plat_plc)) = map.get("platPlc") {
                    let cleaned = clean_lot_location(plat_plc);
                    map.insert("platPlc".into(), Value::String(cleaned));
                }
                Some(map)
            }
            _ => None,
        })
        .collect()
}

/// "서울특별시 강남구 역삼동 123-4번지" → "강남구 역삼동 123-4"
fn clean_lot_location(raw: &str) -> String {
    let without_region = LEADING_REGION.replace(raw, "");
    without_region
        .strip_suffix("번지")
        .unwrap_or(&without_region)
        .to_string()
}

/// Adds derived counts and composite fields and normalizes dates.
#[must_use]
pub fn process(item: &Map<String, Value>) -> Map<String, Value> {
    let mut data = item.clone();

    for field in DATE_FIELDS {
        let formatted = match data.get(field) {
            Some(Value::String(raw)) if !raw.is_empty() => format_compact_date(raw),
            Some(Value::Number(raw)) => format_compact_date(&raw.to_string()),
            _ => continue,
        };
        data.insert(field.to_string(), Value::String(formatted));
    }

    let elevators = sum_counts(item, &ELEVATOR_PARTS);
    let parking = sum_counts(item, &PARKING_PARTS);
    data.insert(ELEVATOR_COUNT.into(), json!(elevators));
    data.insert(PARKING_COUNT.into(), json!(parking));

    let households = parse_count(item.get("hhldCnt"));
    let families = parse_count(item.get("fmlyCnt"));
    let units = parse_count(item.get("hoCnt"));
    data.insert(
        HOUSEHOLD_SUMMARY.into(),
        Value::String(format!("{households}/{families}/{units}")),
    );

    let above_ground = parse_count(item.get("grndFlrCnt"));
    let below_ground = parse_count(item.get("ugrndFlrCnt"));
    data.insert(
        FLOOR_SUMMARY.into(),
        Value::String(format!("-{below_ground}/{above_ground}")),
    );

    data
}

/// Saturates instead of overflowing on absurd upstream counts.
fn sum_counts(item: &Map<String, Value>, keys: &[&str]) -> i64 {
    keys.iter()
        .map(|key| parse_count(item.get(*key)))
        .fold(0i64, i64::saturating_add)
}

/// Renames registry short codes; unmapped keys keep their name.
#[must_use]
pub fn map_field_names(item: Map<String, Value>) -> Map<String, Value> {
    item.into_iter()
        .map(|(key, value)| {
            let renamed = FIELD_NAMES
                .iter()
                .find(|(code, _)| *code == key)
                .map_or(key, |(_, name)| (*name).to_string());
            (renamed, value)
        })
        .collect()
}

#[must_use]
pub fn has_meaningful_data(mapped: &Map<String, Value>) -> bool {
    MEANINGFUL_FIELDS
        .iter()
        .any(|field| is_meaningful(mapped.get(*field)))
}

/// Selects the update payload, omitting absent values and a blank approval date.
#[must_use]
pub fn update_fields(mapped: &Map<String, Value>) -> FieldMap {
    let mut fields = FieldMap::new();
    for name in UPDATE_FIELDS {
        let Some(value) = mapped.get(*name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if *name == APPROVAL_DATE && value.as_str().is_some_and(|s| s.trim().is_empty()) {
            continue;
        }
        fields.insert((*name).to_string(), value.clone());
    }
    fields
}
