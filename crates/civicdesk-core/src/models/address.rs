//! Postal addresses and geographic points.

use serde::{Deserialize, Serialize};

use crate::error::{CivicError, CivicResult};
use crate::pincode::Pincode;

/// A `[longitude, latitude]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> CivicResult<Self> {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CivicError::validation(
                "INVALID_COORDINATES",
                format!("longitude {longitude} is outside [-180, 180]"),
            ));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CivicError::validation(
                "INVALID_COORDINATES",
                format!("latitude {latitude} is outside [-90, 90]"),
            ));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
    pub coordinates: Option<GeoPoint>,
}
