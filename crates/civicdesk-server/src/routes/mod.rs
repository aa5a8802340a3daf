//! HTTP routes.
//!
//! Every successful response is wrapped as
//! `{"success": true, "message"?: ..., "data": ...}`; errors use the
//! envelope rendered by [`crate::error::ApiError`].

pub mod auth;
pub mod complaints;
pub mod departments;
pub mod employees;
pub mod municipal;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use civicdesk_core::repository::PaginatedResult;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

/// Paginated list payload.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> From<PaginatedResult<T>> for Page<T> {
    fn from(result: PaginatedResult<T>) -> Self {
        Self {
            items: result.items,
            total: result.total,
            offset: result.offset,
            limit: result.limit,
        }
    }
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

pub fn ok<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data,
    })
}

pub fn ok_with<T>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data,
    })
}

pub fn created<T>(message: &'static str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok_with(message, data))
}

async fn health() -> Json<Envelope<&'static str>> {
    ok("ok")
}

/// Assemble public and authenticated routes.
pub fn api(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .merge(auth::public())
        .merge(departments::public());

    let protected = Router::new()
        .merge(auth::protected())
        .merge(departments::protected())
        .merge(employees::routes())
        .merge(complaints::routes())
        .merge(municipal::routes())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    public.merge(protected).with_state(state)
}
