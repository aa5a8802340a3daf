//! `/api/municipal-admin` — pincode jurisdiction of municipal admins.

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use civicdesk_core::pincode::AreaSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResult, ok, ok_with};
use crate::extract::{ApiJson, ApiPath, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/municipal-admin/:id/pincodes",
        get(fetch).post(add).put(replace).delete(remove),
    )
}

#[derive(Debug, Deserialize)]
pub struct PincodeList {
    #[serde(default)]
    pub pincodes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminArea {
    pub admin_id: Uuid,
    pub pincodes: AreaSet,
}

async fn fetch(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(admin_id): ApiPath<Uuid>,
) -> ApiResult<AdminArea> {
    let pincodes = state
        .jurisdiction
        .get_pincodes(&user.actor(), admin_id)
        .await?;
    Ok(ok(AdminArea { admin_id, pincodes }))
}

async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(admin_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PincodeList>,
) -> ApiResult<AdminArea> {
    let pincodes = state
        .jurisdiction
        .add_pincodes(&user.actor(), admin_id, &body.pincodes)
        .await?;
    Ok(ok_with("Pincodes added", AdminArea { admin_id, pincodes }))
}

async fn replace(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(admin_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PincodeList>,
) -> ApiResult<AdminArea> {
    let pincodes = state
        .jurisdiction
        .replace_pincodes(&user.actor(), admin_id, &body.pincodes)
        .await?;
    Ok(ok_with("Pincodes updated", AdminArea { admin_id, pincodes }))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(admin_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PincodeList>,
) -> ApiResult<AdminArea> {
    let pincodes = state
        .jurisdiction
        .remove_pincodes(&user.actor(), admin_id, &body.pincodes)
        .await?;
    Ok(ok_with("Pincodes removed", AdminArea { admin_id, pincodes }))
}
