//! `/api/employees`

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use civicdesk_core::models::user::User;
use civicdesk_workflow::employee::{EmployeePatch, EmployeeQuery, NewEmployee};
use uuid::Uuid;

use super::{ApiResult, Created, Page, created, ok, ok_with};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/employees", get(list).post(create))
        .route("/api/employees/:id", get(fetch).put(update).delete(deactivate))
}

/// Create the account, then send the verification mail. A failure to
/// issue the mail does not undo the account.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<NewEmployee>,
) -> Created<User> {
    let employee = state.employees.create(&user.actor(), body).await?;
    if let Err(err) = state.identity.resend_verification(employee.id).await {
        tracing::warn!(user_id = %employee.id, error = %err, "Verification mail not issued");
    }
    Ok(created("Employee created successfully", employee))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<EmployeeQuery>,
) -> ApiResult<Page<User>> {
    let page = state.employees.list(&user.actor(), query).await?;
    Ok(ok(page.into()))
}

async fn fetch(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<User> {
    Ok(ok(state.employees.get(&user.actor(), id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<EmployeePatch>,
) -> ApiResult<User> {
    let employee = state.employees.update(&user.actor(), id, body).await?;
    Ok(ok_with("Employee updated", employee))
}

async fn deactivate(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<User> {
    let employee = state.employees.deactivate(&user.actor(), id).await?;
    Ok(ok_with("Employee deactivated", employee))
}
