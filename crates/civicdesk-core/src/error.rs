//! Error types for the CivicDesk system.
//!
//! Every variant maps to an HTTP-equivalent status and a stable
//! machine-readable code so that callers can branch without matching on
//! message text.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CivicError {
    #[error("Validation error: {message}")]
    Validation { code: &'static str, message: String },

    #[error("Invalid pincode for {field}: {value}")]
    InvalidPincode { field: String, value: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Authentication required: {reason}")]
    Unauthenticated { reason: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Duplicate entry: {field} already exists")]
    DuplicateEntry { field: String },

    #[error("Department name already exists: {name}")]
    DuplicateName { name: String },

    #[error("Department code already exists: {code}")]
    DuplicateCode { code: String },

    #[error("User {user_id} already heads another department")]
    HeadAlreadyAssigned { user_id: Uuid },

    #[error("Department {department_id} already has a head")]
    DepartmentHeadExists { department_id: Uuid },

    #[error("Invalid role: {message}")]
    InvalidRole { message: String },

    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    #[error("Complaint {complaint_id} is already assigned")]
    AlreadyAssigned { complaint_id: Uuid },

    #[error("User {user_id} is already active staff of this department")]
    StaffExists { user_id: Uuid },

    #[error("No jurisdiction: {reason}")]
    NoJurisdiction { reason: String },

    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CivicResult<T> = Result<T, CivicError>;

impl CivicError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::InvalidPincode { .. }
            | Self::InvalidRole { .. }
            | Self::InvalidStatus { .. }
            | Self::NoJurisdiction { .. } => 400,
            Self::Unauthenticated { .. } | Self::InvalidCredentials => 401,
            Self::Forbidden { .. } | Self::AccountDeactivated | Self::EmailNotVerified => 403,
            Self::NotFound { .. } => 404,
            Self::DuplicateEntry { .. }
            | Self::DuplicateName { .. }
            | Self::DuplicateCode { .. }
            | Self::HeadAlreadyAssigned { .. }
            | Self::DepartmentHeadExists { .. }
            | Self::AlreadyAssigned { .. }
            | Self::StaffExists { .. }
            | Self::Conflict { .. } => 409,
            Self::AccountLocked { .. } => 423,
            Self::RateLimited => 429,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => *code,
            Self::InvalidPincode { .. } => "INVALID_PINCODE",
            Self::NotFound { entity, .. } => match entity.as_str() {
                "user" => "USER_NOT_FOUND",
                "employee" => "EMPLOYEE_NOT_FOUND",
                "department" => "DEPARTMENT_NOT_FOUND",
                "complaint" => "COMPLAINT_NOT_FOUND",
                "staff" => "STAFF_NOT_FOUND",
                "municipal_admin" => "MUNICIPAL_ADMIN_NOT_FOUND",
                _ => "NOT_FOUND",
            },
            Self::Forbidden { .. } => "ACCESS_DENIED",
            Self::Unauthenticated { .. } => "INVALID_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::DuplicateEntry { field } => match field.as_str() {
                "email" => "EMAIL_EXISTS",
                "phone" => "PHONE_EXISTS",
                "employee_id" => "EMPLOYEE_ID_EXISTS",
                _ => "DUPLICATE_ENTRY",
            },
            Self::DuplicateName { .. } => "DEPARTMENT_EXISTS",
            Self::DuplicateCode { .. } => "DEPARTMENT_CODE_EXISTS",
            Self::HeadAlreadyAssigned { .. } => "USER_ALREADY_HEAD",
            Self::DepartmentHeadExists { .. } => "DEPARTMENT_HEAD_EXISTS",
            Self::InvalidRole { .. } => "INVALID_ROLE",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            Self::StaffExists { .. } => "STAFF_EXISTS",
            Self::NoJurisdiction { .. } => "NO_ADMIN_AREA",
            Self::Conflict { .. } => "CONCURRENT_MODIFICATION",
            Self::RateLimited => "TOO_MANY_REQUESTS",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is unclassified and must not leak detail to
    /// the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}
