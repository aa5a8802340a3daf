//! SurrealDB implementation of [`UserRepository`].
//!
//! Raw passwords never reach the database: `create` and `update` hash
//! them with Argon2id (see [`crate::password`]) before binding.

use chrono::{DateTime, Utc};
use civicdesk_core::error::CivicResult;
use civicdesk_core::models::department::StaffEntry;
use civicdesk_core::models::user::{
    CreateUser, NotificationPreferences, Role, UpdateUser, User, UserFilter,
};
use civicdesk_core::repository::{
    DepartmentEnrollment, PaginatedResult, Pagination, UserRepository,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    CountRow, area_strings, from_json, parse_area, parse_optional_uuid, parse_uuid, to_json,
};
use crate::error::{DbError, HEAD_SLOT_TAKEN};
use crate::password::hash_password;

const ENTITY: &str = "user";

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)";

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    password_hash: String,
    role: String,
    department_id: Option<String>,
    employee_id: Option<String>,
    admin_area: Vec<String>,
    service_area: Vec<String>,
    address: Option<serde_json::Value>,
    notification_preferences: Option<serde_json::Value>,
    is_active: bool,
    is_verified: bool,
    verification_token_hash: Option<String>,
    verification_expires_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    login_attempts: u32,
    lock_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| DbError::corrupt(ENTITY, e))?;
        Ok(User {
            id: parse_uuid(ENTITY, &self.record_id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            role,
            department_id: parse_optional_uuid(ENTITY, self.department_id)?,
            employee_id: self.employee_id,
            admin_area: parse_area(ENTITY, self.admin_area)?,
            service_area: parse_area(ENTITY, self.service_area)?,
            address: self.address.map(|a| from_json(ENTITY, a)).transpose()?,
            notification_preferences: self
                .notification_preferences
                .map(|p| from_json(ENTITY, p))
                .transpose()?
                .unwrap_or_default(),
            is_active: self.is_active,
            is_verified: self.is_verified,
            verification_token_hash: self.verification_token_hash,
            verification_expires_at: self.verification_expires_at,
            last_login: self.last_login,
            login_attempts: self.login_attempts,
            lock_until: self.lock_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_user(rows: Vec<UserRow>, key: impl FnOnce() -> String) -> Result<User, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::not_found(ENTITY, key()))?
        .try_into_user()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn find_one(&self, field: &'static str, value: &str) -> CivicResult<User> {
        let query = format!("SELECT meta::id(id) AS record_id, * FROM user WHERE {field} = $value");
        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, || format!("{field}={value}"))?)
    }

    fn prepare(&self, input: CreateUser) -> Result<NewUser, DbError> {
        Ok(NewUser {
            id: Uuid::new_v4(),
            password_hash: hash_password(&input.password, self.pepper.as_deref())?,
            address: input.address.as_ref().map(|a| to_json(ENTITY, a)).transpose()?,
            address_pincode: input.address.as_ref().map(|a| a.pincode.to_string()),
            preferences: to_json(ENTITY, &NotificationPreferences::default())?,
            input,
        })
    }
}

const CREATE_USER: &str = "CREATE type::record('user', $id) SET \
     first_name = $first_name, last_name = $last_name, \
     email = $email, phone = $phone, \
     password_hash = $password_hash, role = $role, \
     department_id = $department_id, employee_id = $employee_id, \
     admin_area = $admin_area, service_area = $service_area, \
     address = $address, address_pincode = $address_pincode, \
     notification_preferences = $notification_preferences, \
     is_active = true, is_verified = $is_verified, \
     verification_token_hash = $verification_token_hash, \
     verification_expires_at = $verification_expires_at, \
     login_attempts = 0, \
     created_at = time::now(), updated_at = time::now();";

/// A validated `CreateUser` with its password hashed and nested values
/// encoded.
struct NewUser {
    id: Uuid,
    password_hash: String,
    address: Option<serde_json::Value>,
    address_pincode: Option<String>,
    preferences: serde_json::Value,
    input: CreateUser,
}

/// Bind every `CREATE_USER` parameter on a query builder.
macro_rules! bind_new_user {
    ($query:expr, $user:expr) => {{
        let user: NewUser = $user;
        $query
            .bind(("id", user.id.to_string()))
            .bind(("first_name", user.input.first_name))
            .bind(("last_name", user.input.last_name))
            .bind(("email", user.input.email))
            .bind(("phone", user.input.phone))
            .bind(("password_hash", user.password_hash))
            .bind(("role", user.input.role.as_str().to_string()))
            .bind(("department_id", user.input.department_id.map(|d| d.to_string())))
            .bind(("employee_id", user.input.employee_id))
            .bind(("admin_area", area_strings(&user.input.admin_area)))
            .bind(("service_area", area_strings(&user.input.service_area)))
            .bind(("address", user.address))
            .bind(("address_pincode", user.address_pincode))
            .bind(("notification_preferences", user.preferences))
            .bind(("is_verified", user.input.is_verified))
            .bind(("verification_token_hash", user.input.verification_token_hash))
            .bind(("verification_expires_at", user.input.verification_expires_at))
    }};
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> CivicResult<User> {
        let user = self.prepare(input)?;
        let id = user.id;

        let query = format!("{CREATE_USER}\n{SELECT_BY_ID};");
        let result = bind_new_user!(self.db.query(query), user)
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, || id.to_string())?)
    }

    async fn create_enrolled(
        &self,
        input: CreateUser,
        enrollment: DepartmentEnrollment,
    ) -> CivicResult<User> {
        let user = self.prepare(input)?;
        let id = user.id;

        let entry = to_json(
            "department",
            &StaffEntry {
                user_id: id,
                role: enrollment.staff_role,
                is_active: true,
                joined_at: Utc::now(),
            },
        )?;
        // The slot check runs first inside the transaction so a concurrent
        // head enrollment cannot overwrite the winner.
        let (guard, head) = if enrollment.as_head {
            (
                format!(
                    "IF (SELECT VALUE head_id FROM ONLY \
                     type::record('department', $enroll_department)) != NONE \
                     {{ THROW '{HEAD_SLOT_TAKEN}' }};"
                ),
                ", head_id = $id",
            )
        } else {
            (String::new(), "")
        };
        let query = format!(
            "BEGIN TRANSACTION;\n\
             {guard}\n\
             {CREATE_USER}\n\
             UPDATE type::record('department', $enroll_department) SET \
             staff += $staff_entry{head}, updated_at = time::now();\n\
             COMMIT TRANSACTION;"
        );

        bind_new_user!(self.db.query(query), user)
            .bind(("enroll_department", enrollment.department_id.to_string()))
            .bind(("staff_entry", entry))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> CivicResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, || id_str)?)
    }

    async fn get_by_email(&self, email: &str) -> CivicResult<User> {
        self.find_one("email", email).await
    }

    async fn get_by_phone(&self, phone: &str) -> CivicResult<User> {
        self.find_one("phone", phone).await
    }

    async fn get_by_employee_id(&self, employee_id: &str) -> CivicResult<User> {
        self.find_one("employee_id", employee_id).await
    }

    async fn get_by_verification_token(&self, token_hash: &str) -> CivicResult<User> {
        self.find_one("verification_token_hash", token_hash).await
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> CivicResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.password.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.department_id.is_some() {
            sets.push("department_id = $department_id");
        }
        if input.admin_area.is_some() {
            sets.push("admin_area = $admin_area");
        }
        if input.service_area.is_some() {
            sets.push("service_area = $service_area");
        }
        if input.address.is_some() {
            sets.push("address = $address, address_pincode = $address_pincode");
        }
        if input.notification_preferences.is_some() {
            sets.push("notification_preferences = $notification_preferences");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.is_verified.is_some() {
            sets.push("is_verified = $is_verified");
        }
        if input.verification_token_hash.is_some() {
            sets.push("verification_token_hash = $verification_token_hash");
        }
        if input.verification_expires_at.is_some() {
            sets.push("verification_expires_at = $verification_expires_at");
        }
        if input.last_login.is_some() {
            sets.push("last_login = $last_login");
        }
        if input.login_attempts.is_some() {
            sets.push("login_attempts = $login_attempts");
        }
        if input.lock_until.is_some() {
            sets.push("lock_until = $lock_until");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {};\n{SELECT_BY_ID};",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));

        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(password) = input.password {
            let password_hash = hash_password(&password, self.pepper.as_deref())?;
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(department_id) = input.department_id {
            // Some(None) clears the department.
            builder = builder.bind(("department_id", department_id.map(|d| d.to_string())));
        }
        if let Some(admin_area) = input.admin_area {
            builder = builder.bind(("admin_area", area_strings(&admin_area)));
        }
        if let Some(service_area) = input.service_area {
            builder = builder.bind(("service_area", area_strings(&service_area)));
        }
        if let Some(address) = input.address {
            builder = builder
                .bind(("address_pincode", address.pincode.to_string()))
                .bind(("address", to_json(ENTITY, &address)?));
        }
        if let Some(preferences) = input.notification_preferences {
            builder = builder.bind(("notification_preferences", to_json(ENTITY, &preferences)?));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(is_verified) = input.is_verified {
            builder = builder.bind(("is_verified", is_verified));
        }
        if let Some(token_hash) = input.verification_token_hash {
            builder = builder.bind(("verification_token_hash", token_hash));
        }
        if let Some(expires_at) = input.verification_expires_at {
            builder = builder.bind(("verification_expires_at", expires_at));
        }
        if let Some(last_login) = input.last_login {
            builder = builder.bind(("last_login", last_login));
        }
        if let Some(login_attempts) = input.login_attempts {
            builder = builder.bind(("login_attempts", login_attempts));
        }
        if let Some(lock_until) = input.lock_until {
            builder = builder.bind(("lock_until", lock_until));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, || id_str)?)
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        threshold: u32,
        now: DateTime<Utc>,
        lock_until: DateTime<Utc>,
    ) -> CivicResult<User> {
        self.db
            .query(
                "BEGIN TRANSACTION;\n\
                 UPDATE type::record('user', $id) SET \
                 login_attempts = IF lock_until != NONE AND lock_until <= $now \
                 { 1 } ELSE { login_attempts + 1 }, \
                 lock_until = IF lock_until != NONE AND lock_until <= $now \
                 { NONE } ELSE { lock_until }, \
                 updated_at = time::now();\n\
                 UPDATE type::record('user', $id) SET lock_until = $lock_until \
                 WHERE login_attempts >= $threshold;\n\
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("now", now))
            .bind(("lock_until", lock_until))
            .bind(("threshold", threshold))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.get_by_id(id).await
    }

    async fn deactivate(&self, id: Uuid) -> CivicResult<User> {
        let id_str = id.to_string();

        let query = format!(
            "UPDATE type::record('user', $id) SET \
             is_active = false, \
             email = string::concat('deleted_', $stamp, '_', email), \
             updated_at = time::now() \
             WHERE is_active = true;\n{SELECT_BY_ID};"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("stamp", Utc::now().timestamp().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, || id_str)?)
    }

    async fn list(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> CivicResult<PaginatedResult<User>> {
        let mut conditions = Vec::new();
        if filter.roles.is_some() {
            conditions.push("role IN $roles");
        }
        if filter.department_id.is_some() {
            conditions.push("department_id = $department_id");
        }
        if filter.address_pincodes.is_some() {
            conditions.push("address_pincode IN $pincodes");
        }
        if filter.is_active.is_some() {
            conditions.push("is_active = $is_active");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT count() AS total FROM user {where_clause} GROUP ALL;\n\
             SELECT meta::id(id) AS record_id, * FROM user {where_clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(roles) = filter.roles {
            let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
            builder = builder.bind(("roles", roles));
        }
        if let Some(department_id) = filter.department_id {
            builder = builder.bind(("department_id", department_id.to_string()));
        }
        if let Some(pincodes) = filter.address_pincodes {
            builder = builder.bind(("pincodes", area_strings(&pincodes)));
        }
        if let Some(is_active) = filter.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
