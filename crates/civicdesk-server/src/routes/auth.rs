//! `/api/auth` — registration, login, e-mail verification, account
//! self-service and account administration.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put};
use civicdesk_auth::{AccountUpdate, LoginInput, LoginOutput, ProfileUpdate, RegisterInput};
use civicdesk_core::models::user::{NotificationPreferences, Role, User, UserFilter};
use civicdesk_core::pincode::parse_area;
use civicdesk_core::repository::Pagination;
use civicdesk_workflow::double_option;
use civicdesk_workflow::employee::AddressInput;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResult, Created, Page, created, ok, ok_with};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::middleware::client_key;
use crate::state::AppState;

const USERS_PAGE_SIZE: u64 = 25;

pub fn public() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify/:token", get(verify_email))
}

pub fn protected() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/updatedetails", put(update_details))
        .route("/api/auth/updatepassword", put(update_password))
        .route("/api/auth/deleteaccount", delete(delete_account))
        .route("/api/auth/users", get(list_users))
        .route("/api/auth/users/:id", get(get_user).put(update_user))
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

impl From<LoginOutput> for Session {
    fn from(out: LoginOutput) -> Self {
        Self {
            access_token: out.access_token,
            token_type: "Bearer",
            expires_in: out.expires_in,
            user: out.user,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub address: Option<AddressInput>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailsRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub notification_preferences: Option<NotificationPreferences>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordConfirmation {
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub admin_area: Option<Vec<String>>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_verified: Option<bool>,
}

async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Created<Session> {
    let input = RegisterInput {
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        phone: body.phone,
        password: body.password,
        address: body.address.map(AddressInput::into_address).transpose()?,
    };
    let out = state.identity.register(input).await?;
    Ok(created(
        "Registration successful. Please check your email to verify your account.",
        out.into(),
    ))
}

async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Session> {
    let client_key = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_proxy,
    );
    let out = state
        .identity
        .login(LoginInput {
            email: body.email,
            password: body.password,
            client_key,
        })
        .await?;
    Ok(ok(out.into()))
}

async fn verify_email(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<User> {
    let user = state.identity.verify_email(&token).await?;
    Ok(ok_with("Email verified successfully", user))
}

async fn me(user: CurrentUser) -> ApiResult<User> {
    Ok(ok(user.0))
}

async fn resend_verification(State(state): State<AppState>, user: CurrentUser) -> ApiResult<()> {
    state.identity.resend_verification(user.0.id).await?;
    Ok(ok_with("Verification email sent", ()))
}

async fn update_details(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<DetailsRequest>,
) -> ApiResult<User> {
    let update = ProfileUpdate {
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        address: body.address.map(AddressInput::into_address).transpose()?,
        notification_preferences: body.notification_preferences,
    };
    let user = state.identity.update_details(user.0.id, update).await?;
    Ok(ok(user))
}

async fn update_password(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<PasswordChange>,
) -> ApiResult<Session> {
    let out = state
        .identity
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok(ok_with("Password updated", out.into()))
}

async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<PasswordConfirmation>,
) -> ApiResult<()> {
    state.identity.delete_account(user.0.id, &body.password).await?;
    Ok(ok_with("Account deleted", ()))
}

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<UsersQuery>,
) -> ApiResult<Page<User>> {
    let roles = query
        .role
        .as_deref()
        .map(|r| r.trim().parse::<Role>())
        .transpose()?
        .map(|role| vec![role]);
    let filter = UserFilter {
        roles,
        department_id: query.department_id,
        address_pincodes: None,
        is_active: query.is_active,
    };
    let pagination = Pagination::page(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(USERS_PAGE_SIZE),
    );
    let page = state
        .identity
        .list_users(&user.actor(), filter, pagination)
        .await?;
    Ok(ok(page.into()))
}

async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<User> {
    let found = state.identity.get_user(&user.actor(), id).await?;
    Ok(ok(found))
}

async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AccountRequest>,
) -> ApiResult<User> {
    let update = AccountUpdate {
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        phone: body.phone,
        role: body.role,
        department_id: body.department_id,
        admin_area: body
            .admin_area
            .map(|area| parse_area("adminArea", area))
            .transpose()?,
        address: body.address.map(AddressInput::into_address).transpose()?,
        is_active: body.is_active,
        is_verified: body.is_verified,
    };
    let updated = state.identity.update_user(&user.actor(), id, update).await?;
    Ok(ok(updated))
}
