use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::NormalizedAddress;

/// Normalized field name → value, exactly as written back to the store.
/// Absent keys are left untouched upstream.
pub type FieldMap = Map<String, Value>;

/// Field holding the lot address in both tables.
pub const ADDRESS_FIELD: &str = "지번 주소";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Building,
    Land,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Building, Domain::Land];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Building => "building",
            Domain::Land => "land",
        }
    }

    /// Label used in operator-facing messages.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Domain::Building => "건축물",
            Domain::Land => "토지",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work, materialized fresh from the store on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: String,
    pub address: String,
}

impl Record {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdministrativeCodes {
    pub address: NormalizedAddress,
    pub district_code: String,
    pub legal_dong_code: String,
}

impl AdministrativeCodes {
    /// Builds the PNU, or `None` when any component is empty.
    #[must_use]
    pub fn parcel_identifier(&self) -> Option<ParcelIdentifier> {
        ParcelIdentifier::build(
            &self.district_code,
            &self.legal_dong_code,
            &self.address.lot_main,
            &self.address.lot_sub,
        )
    }
}

/// Land parcel key: district code, legal-dong code, land-type digit, lot, sub-lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParcelIdentifier(String);

impl ParcelIdentifier {
    const LAND_TYPE_GENERAL: &'static str = "1";

    #[must_use]
    pub fn build(
        district_code: &str,
        legal_dong_code: &str,
        lot_main: &str,
        lot_sub: &str,
    ) -> Option<Self> {
        if [district_code, legal_dong_code, lot_main, lot_sub]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return None;
        }
        Some(Self(format!(
            "{district_code}{legal_dong_code}{}{lot_main}{lot_sub}",
            Self::LAND_TYPE_GENERAL
        )))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParcelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
