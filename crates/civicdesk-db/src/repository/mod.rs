//! SurrealDB repository implementations.
//!
//! Each repository selects rows as `meta::id(id) AS record_id, *` and
//! converts them into core models, so one row struct per table covers
//! every read.

mod complaint;
mod department;
mod throttle;
mod user;

pub use complaint::SurrealComplaintRepository;
pub use department::SurrealDepartmentRepository;
pub use throttle::SurrealThrottleRepository;
pub use user::SurrealUserRepository;

use civicdesk_core::pincode::{AreaSet, Pincode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(entity: &'static str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::corrupt(entity, format!("invalid UUID: {e}")))
}

fn parse_optional_uuid(entity: &'static str, value: Option<String>) -> Result<Option<Uuid>, DbError> {
    value.as_deref().map(|v| parse_uuid(entity, v)).transpose()
}

fn parse_area(entity: &'static str, values: Vec<String>) -> Result<AreaSet, DbError> {
    values
        .into_iter()
        .map(|v| Pincode::parse(&v).map_err(|e| DbError::corrupt(entity, e)))
        .collect()
}

fn area_strings(area: &AreaSet) -> Vec<String> {
    area.iter().map(|p| p.as_str().to_string()).collect()
}

fn to_json<T: Serialize>(entity: &'static str, value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::corrupt(entity, e))
}

fn from_json<T: DeserializeOwned>(
    entity: &'static str,
    value: serde_json::Value,
) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::corrupt(entity, e))
}
