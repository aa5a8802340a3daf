//! `/api/departments`

use axum::Router;
use axum::extract::State;
use axum::routing::{delete, get};
use civicdesk_core::models::department::{Department, DepartmentStats, StaffEntry};
use civicdesk_workflow::department::{DepartmentPatch, DepartmentQuery, NewDepartment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResult, Created, Page, created, ok, ok_with};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::state::AppState;

pub fn public() -> Router<AppState> {
    Router::new().route("/api/departments/by-pincode/:pincode", get(by_pincode))
}

pub fn protected() -> Router<AppState> {
    Router::new()
        .route("/api/departments", get(list).post(create))
        .route(
            "/api/departments/:id",
            get(fetch).put(update).delete(remove),
        )
        .route("/api/departments/:id/staff", get(staff).post(add_staff))
        .route("/api/departments/:id/staff/:user_id", delete(remove_staff))
        .route("/api/departments/:id/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddStaff {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StaffListing {
    pub department_id: Uuid,
    pub department_name: String,
    pub staff: Vec<StaffEntry>,
}

async fn by_pincode(
    State(state): State<AppState>,
    ApiPath(pincode): ApiPath<String>,
) -> ApiResult<Vec<Department>> {
    let departments = state.departments.list_by_pincode(&pincode).await?;
    Ok(ok(departments))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<DepartmentQuery>,
) -> ApiResult<Page<Department>> {
    let page = state.departments.list(&user.actor(), query).await?;
    Ok(ok(page.into()))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<NewDepartment>,
) -> Created<Department> {
    let department = state.departments.create(&user.actor(), body).await?;
    Ok(created("Department created", department))
}

async fn fetch(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Department> {
    Ok(ok(state.departments.get(&user.actor(), id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<DepartmentPatch>,
) -> ApiResult<Department> {
    let department = state.departments.update(&user.actor(), id, body).await?;
    Ok(ok_with("Department updated", department))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.departments.delete(&user.actor(), id).await?;
    Ok(ok_with("Department deleted", ()))
}

async fn staff(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<StaffQuery>,
) -> ApiResult<StaffListing> {
    let (department, staff) = state
        .departments
        .staff(&user.actor(), id, query.include_inactive)
        .await?;
    Ok(ok(StaffListing {
        department_id: department.id,
        department_name: department.name,
        staff,
    }))
}

async fn add_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AddStaff>,
) -> Created<Department> {
    let department = state
        .departments
        .add_staff(&user.actor(), id, body.user_id, body.role)
        .await?;
    Ok(created("Staff member added", department))
}

async fn remove_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state
        .departments
        .remove_staff(&user.actor(), id, user_id)
        .await?;
    Ok(ok_with("Staff member removed", ()))
}

async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<DepartmentStats> {
    Ok(ok(state.departments.stats(&user.actor(), id).await?))
}
