//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Writes that touch a department
//! and a user together are single repository calls so that
//! implementations can apply them in one transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CivicResult;
use crate::models::complaint::Complaint;
use crate::models::department::{
    CreateDepartment, Department, DepartmentFilter, StaffEntry, UpdateDepartment,
};
use crate::models::user::{CreateUser, Role, UpdateUser, User, UserFilter};
use crate::pincode::AreaSet;

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Largest offset the store accepts as a signed integer.
const MAX_OFFSET: u64 = i64::MAX as u64;

impl Pagination {
    pub fn page(page: u64, limit: u64) -> Self {
        let limit = limit.clamp(1, 100);
        Self {
            offset: page.saturating_sub(1).saturating_mul(limit).min(MAX_OFFSET),
            limit,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// User-side half of a department write: the user's department and,
/// optionally, role are rewritten in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UserLink {
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub role: Option<Role>,
}

/// Department-side half of creating an employee: a new roster line, and
/// optionally the head slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentEnrollment {
    pub department_id: Uuid,
    pub staff_role: String,
    pub as_head: bool,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CivicResult<User>> + Send;
    /// Create a user and enroll them in a department atomically.
    fn create_enrolled(
        &self,
        input: CreateUser,
        enrollment: DepartmentEnrollment,
    ) -> impl Future<Output = CivicResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CivicResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = CivicResult<User>> + Send;
    fn get_by_phone(&self, phone: &str) -> impl Future<Output = CivicResult<User>> + Send;
    fn get_by_employee_id(
        &self,
        employee_id: &str,
    ) -> impl Future<Output = CivicResult<User>> + Send;
    fn get_by_verification_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = CivicResult<User>> + Send;
    fn update(&self, id: Uuid, input: UpdateUser)
    -> impl Future<Output = CivicResult<User>> + Send;
    /// Count a failed login in one atomic write. A lock that lapsed
    /// before `now` restarts the count; reaching `threshold` sets
    /// `lock_until`.
    fn record_failed_login(
        &self,
        id: Uuid,
        threshold: u32,
        now: DateTime<Utc>,
        lock_until: DateTime<Utc>,
    ) -> impl Future<Output = CivicResult<User>> + Send;
    /// Soft delete: deactivate and release the e-mail for reuse.
    fn deactivate(&self, id: Uuid) -> impl Future<Output = CivicResult<User>> + Send;
    fn list(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CivicResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

pub trait DepartmentRepository: Send + Sync {
    /// Create a department; when it has a head, the head's department
    /// is set in the same transaction.
    fn create(
        &self,
        input: CreateDepartment,
    ) -> impl Future<Output = CivicResult<Department>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CivicResult<Department>> + Send;
    /// Active department with this exact name, if any.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = CivicResult<Option<Department>>> + Send;
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = CivicResult<Option<Department>>> + Send;
    fn find_by_head(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CivicResult<Option<Department>>> + Send;
    /// Update a department. A head change also writes the roster, links
    /// the incoming head and unlinks the outgoing one in the same
    /// transaction.
    fn update(
        &self,
        id: Uuid,
        input: UpdateDepartment,
    ) -> impl Future<Output = CivicResult<Department>> + Send;
    /// Replace the roster and apply `link` to the user atomically.
    fn save_staff(
        &self,
        id: Uuid,
        staff: Vec<StaffEntry>,
        link: Option<UserLink>,
    ) -> impl Future<Output = CivicResult<Department>> + Send;
    /// Soft delete: deactivate, release name and code, clear the head.
    fn delete(&self, id: Uuid) -> impl Future<Output = CivicResult<()>> + Send;
    fn list(
        &self,
        filter: DepartmentFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CivicResult<PaginatedResult<Department>>> + Send;
}

// ---------------------------------------------------------------------------
// Complaints
// ---------------------------------------------------------------------------

pub trait ComplaintRepository: Send + Sync {
    fn create(&self, complaint: Complaint) -> impl Future<Output = CivicResult<Complaint>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CivicResult<Complaint>> + Send;
    /// Persist `complaint` if the stored revision still equals
    /// `complaint.revision`; fails with `Conflict` otherwise. Returns
    /// the stored document with its bumped revision.
    fn save(&self, complaint: Complaint) -> impl Future<Output = CivicResult<Complaint>> + Send;
    /// Complaints located in any of `area`, newest first.
    fn list_by_pincodes(
        &self,
        area: &AreaSet,
    ) -> impl Future<Output = CivicResult<Vec<Complaint>>> + Send;
    fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CivicResult<PaginatedResult<Complaint>>> + Send;
    fn list_by_department(
        &self,
        department_id: Uuid,
    ) -> impl Future<Output = CivicResult<Vec<Complaint>>> + Send;
}

// ---------------------------------------------------------------------------
// Login throttle
// ---------------------------------------------------------------------------

/// Expiring counters shared by every process that uses the same store.
pub trait ThrottleRepository: Send + Sync {
    /// Count one hit against `key` and return the count inside the
    /// current window. A window starts at the first hit after expiry.
    fn hit(
        &self,
        key: &str,
        window_secs: u64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = CivicResult<u32>> + Send;
    fn reset(&self, key: &str) -> impl Future<Output = CivicResult<()>> + Send;
}
