//! `/api/complaints`

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post, put};
use civicdesk_core::models::complaint::{Complaint, FileComplaint};
use civicdesk_core::repository::Pagination;
use civicdesk_workflow::complaint::{AssignmentStats, JurisdictionComplaints, StatusUpdate};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, Created, Page, created, ok, ok_with};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::state::AppState;

const MINE_PAGE_SIZE: u64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/complaints", post(file))
        .route("/api/complaints/mine", get(mine))
        .route("/api/complaints/jurisdiction", get(jurisdiction))
        .route("/api/complaints/stats", get(stats))
        .route("/api/complaints/:id", get(fetch))
        .route("/api/complaints/:id/status", put(update_status))
        .route("/api/complaints/:id/assign", post(assign))
        .route("/api/complaints/:id/support", post(support))
        .route("/api/complaints/:id/feedback", post(feedback))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Assignment {
    pub staff_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

async fn file(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<FileComplaint>,
) -> Created<Complaint> {
    let complaint = state.complaints.file(&user.actor(), body).await?;
    Ok(created("Complaint submitted", complaint))
}

async fn mine(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Page<Complaint>> {
    let pagination = Pagination::page(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(MINE_PAGE_SIZE),
    );
    let page = state
        .complaints
        .list_mine(&user.actor(), pagination)
        .await?;
    Ok(ok(page.into()))
}

async fn jurisdiction(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<JurisdictionComplaints> {
    Ok(ok(state.complaints.list_by_jurisdiction(&user.actor()).await?))
}

async fn stats(State(state): State<AppState>, user: CurrentUser) -> ApiResult<AssignmentStats> {
    Ok(ok(state.complaints.assignment_stats(&user.actor()).await?))
}

async fn fetch(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Complaint> {
    Ok(ok(state.complaints.get(&user.actor(), id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> ApiResult<Complaint> {
    let complaint = state
        .complaints
        .update_status(&user.actor(), id, body)
        .await?;
    Ok(ok_with("Status updated", complaint))
}

async fn assign(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Assignment>,
) -> ApiResult<Complaint> {
    let complaint = state
        .complaints
        .assign_staff(&user.actor(), id, body.staff_id)
        .await?;
    Ok(ok_with("Staff assigned successfully", complaint))
}

async fn support(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Complaint> {
    Ok(ok(state.complaints.support(&user.actor(), id).await?))
}

async fn feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<FeedbackRequest>,
) -> ApiResult<Complaint> {
    let complaint = state
        .complaints
        .add_feedback(&user.actor(), id, body.rating, body.comment)
        .await?;
    Ok(ok_with("Feedback recorded", complaint))
}
