//! Six-digit area codes, the unit of jurisdiction matching.
//!
//! A [`Pincode`] can only be constructed through validation, so every
//! admin area, service area, office address and complaint location that
//! holds one is well-formed by construction. Deserialization goes through
//! the same check.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CivicError, CivicResult};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

/// A set of pincodes: admin areas and service areas.
pub type AreaSet = BTreeSet<Pincode>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pincode must be exactly six ASCII digits, got {0:?}")]
pub struct PincodeError(pub String);

impl Pincode {
    pub fn parse(value: &str) -> Result<Self, PincodeError> {
        if value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(PincodeError(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pincode {
    type Err = PincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pincode> for String {
    fn from(value: Pincode) -> Self {
        value.0
    }
}

/// Parse a single pincode, attributing failures to `field`.
pub fn parse_pincode(field: &str, value: &str) -> CivicResult<Pincode> {
    Pincode::parse(value).map_err(|_| CivicError::InvalidPincode {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse every entry of a pincode collection.
///
/// All entries are checked; the error lists every offending value, not
/// only the first one.
pub fn parse_area<I, S>(field: &str, values: I) -> CivicResult<AreaSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut area = AreaSet::new();
    let mut invalid = Vec::new();
    for value in values {
        match Pincode::parse(value.as_ref()) {
            Ok(pincode) => {
                area.insert(pincode);
            }
            Err(PincodeError(raw)) => invalid.push(raw),
        }
    }
    if invalid.is_empty() {
        Ok(area)
    } else {
        Err(CivicError::InvalidPincode {
            field: field.to_string(),
            value: invalid.join(", "),
        })
    }
}

pub fn overlaps(a: &AreaSet, b: &AreaSet) -> bool {
    !a.is_disjoint(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_six_ascii_digits() {
        assert_eq!(Pincode::parse("560001").unwrap().as_str(), "560001");
        assert!(Pincode::parse("000000").is_ok());
    }

    #[test]
    fn rejects_malformed_values() {
        for bad in ["", "56001", "5600012", "56000a", " 560001", "560 01", "٥٦٠٠٠١"] {
            assert!(Pincode::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parse_area_checks_every_entry() {
        let err = parse_area("adminArea", ["560001", "560002", "12345"]).unwrap_err();
        match err {
            CivicError::InvalidPincode { field, value } => {
                assert_eq!(field, "adminArea");
                assert_eq!(value, "12345");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_area("serviceArea", ["abc", "560001", "9"]).unwrap_err();
        assert!(matches!(
            err,
            CivicError::InvalidPincode { ref value, .. } if value == "abc, 9"
        ));
    }

    #[test]
    fn parse_area_deduplicates() {
        let area = parse_area("serviceArea", ["560001", "560001", "560002"]).unwrap();
        assert_eq!(area.len(), 2);
    }

    #[test]
    fn deserialization_validates() {
        let ok: Pincode = serde_json::from_str("\"560001\"").unwrap();
        assert_eq!(ok.to_string(), "560001");
        assert!(serde_json::from_str::<Pincode>("\"56001\"").is_err());
    }

    #[test]
    fn overlap_is_set_intersection() {
        let a = parse_area("a", ["560001", "560002"]).unwrap();
        let b = parse_area("b", ["560002"]).unwrap();
        let c = parse_area("c", ["110001"]).unwrap();
        assert!(overlaps(&a, &b));
        assert!(!overlaps(&a, &c));
        assert!(!overlaps(&a, &AreaSet::new()));
    }
}
