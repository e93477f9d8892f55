//! Lot-address parsing ("강남구 역삼동 123-4" → administrative tuple).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// district/city/county, legal dong, lot main, optional sub-lot
static LOT_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+구|\S+시|\S+군) (\S+) ([0-9]+)(?:-([0-9]+))?$").expect("valid lot address regex")
});

const LOT_WIDTH: usize = 4;
const NO_SUB_LOT: &str = "0000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("malformed lot address: {original}")]
    Malformed { original: String },
}

impl AddressError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            AddressError::Empty => "empty_address",
            AddressError::Malformed { .. } => "malformed_address",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedAddress {
    pub district: String,
    pub legal_dong: String,
    pub lot_main: String,
    pub lot_sub: String,
}

impl NormalizedAddress {
    /// Renders the normalized form back into lot-address text.
    #[must_use]
    pub fn to_address_string(&self) -> String {
        if self.lot_sub == NO_SUB_LOT {
            format!("{} {} {}", self.district, self.legal_dong, self.lot_main)
        } else {
            format!(
                "{} {} {}-{}",
                self.district, self.legal_dong, self.lot_main, self.lot_sub
            )
        }
    }
}

/// Parses a free-text lot address.
///
/// # Errors
/// [`AddressError::Empty`] for blank input, [`AddressError::Malformed`] when the
/// text is not `<district> <legal dong> <lot>[-<sub-lot>]`.
pub fn resolve(address: &str) -> Result<NormalizedAddress, AddressError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Empty);
    }

    let collapsed = WHITESPACE.replace_all(trimmed, " ");
    let Some(captures) = LOT_ADDRESS.captures(&collapsed) else {
        return Err(AddressError::Malformed {
            original: collapsed.into_owned(),
        });
    };

    let lot_sub = captures
        .get(4)
        .map_or_else(|| NO_SUB_LOT.to_string(), |m| pad_lot(m.as_str()));

    Ok(NormalizedAddress {
        district: captures[1].to_string(),
        legal_dong: captures[2].to_string(),
        lot_main: pad_lot(&captures[3]),
        lot_sub,
    })
}

fn pad_lot(raw: &str) -> String {
    format!("{raw:0>width$}", width = LOT_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_main_lot_only() {
        let parsed = resolve("강남구 역삼동 123").expect("valid address");
        assert_eq!(
            parsed,
            NormalizedAddress {
                district: "강남구".into(),
                legal_dong: "역삼동".into(),
                lot_main: "0123".into(),
                lot_sub: "0000".into(),
            }
        );
    }

    #[test]
    fn resolves_sub_lot() {
        let parsed = resolve("강남구 역삼동 123-4").expect("valid address");
        assert_eq!(parsed.lot_main, "0123");
        assert_eq!(parsed.lot_sub, "0004");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let parsed = resolve("  성남시   분당동\t 45-12 ").expect("valid address");
        assert_eq!(parsed.district, "성남시");
        assert_eq!(parsed.legal_dong, "분당동");
        assert_eq!(parsed.lot_main, "0045");
        assert_eq!(parsed.lot_sub, "0012");
    }

    #[test]
    fn county_suffix_is_accepted() {
        let parsed = resolve("양평군 양평읍 7").expect("valid address");
        assert_eq!(parsed.district, "양평군");
    }

    #[test]
    fn empty_and_blank_inputs_are_empty_errors() {
        assert_eq!(resolve(""), Err(AddressError::Empty));
        assert_eq!(resolve("   \t"), Err(AddressError::Empty));
    }

    #[test]
    fn missing_lot_number_is_malformed() {
        let error = resolve("서울시청").expect_err("no lot number");
        assert_eq!(
            error,
            AddressError::Malformed {
                original: "서울시청".into()
            }
        );
        assert_eq!(error.reason(), "malformed_address");
    }

    #[test]
    fn non_numeric_lot_is_malformed() {
        assert!(matches!(
            resolve("강남구 역삼동 산12"),
            Err(AddressError::Malformed { .. })
        ));
    }

    #[test]
    fn normalized_form_round_trips() {
        for input in ["강남구 역삼동 123", "강남구 역삼동 123-4", "양평군 양평읍 7-100"] {
            let first = resolve(input).expect("valid address");
            let second = resolve(&first.to_address_string()).expect("normalized form parses");
            assert_eq!(first, second, "round trip for {input}");
        }
    }
}
