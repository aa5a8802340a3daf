//! User domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CivicError, CivicResult};
use crate::models::address::Address;
use crate::pincode::{AreaSet, Pincode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Staff,
    DepartmentHead,
    MunicipalAdmin,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Citizen,
        Role::Staff,
        Role::DepartmentHead,
        Role::MunicipalAdmin,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Staff => "staff",
            Role::DepartmentHead => "department_head",
            Role::MunicipalAdmin => "municipal_admin",
            Role::Admin => "admin",
        }
    }

    /// Every non-citizen role is an employee role and carries an
    /// employee id.
    pub fn is_employee(&self) -> bool {
        !matches!(self, Role::Citizen)
    }

    pub fn requires_department(&self) -> bool {
        matches!(self, Role::Staff | Role::DepartmentHead)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CivicError::InvalidRole {
                message: format!("unknown role: {s}"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            push: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub employee_id: Option<String>,
    pub admin_area: AreaSet,
    pub service_area: AreaSet,
    pub address: Option<Address>,
    pub notification_preferences: NotificationPreferences,
    pub is_active: bool,
    pub is_verified: bool,
    /// SHA-256 of the outstanding e-mail verification token.
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// True when `pincode` lies inside this user's admin area. Only
    /// municipal admins hold an admin area.
    pub fn has_jurisdiction(&self, pincode: &Pincode) -> bool {
        self.role == Role::MunicipalAdmin && self.admin_area.contains(pincode)
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    pub fn address_pincode(&self) -> Option<&Pincode> {
        self.address.as_ref().map(|a| &a.pincode)
    }
}

/// Role-specific data of an employee.
///
/// Department-bearing roles cannot be expressed without a department, so
/// an employee can never be created in a state that violates the
/// membership requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeRole {
    Staff {
        department_id: Uuid,
        service_area: AreaSet,
    },
    DepartmentHead {
        department_id: Uuid,
    },
    MunicipalAdmin {
        admin_area: AreaSet,
    },
    Admin,
}

impl EmployeeRole {
    /// Build from loosely-typed request fields.
    pub fn from_parts(
        role: Role,
        department_id: Option<Uuid>,
        admin_area: AreaSet,
        service_area: AreaSet,
    ) -> CivicResult<Self> {
        let missing_department = || {
            CivicError::validation(
                "MISSING_DEPARTMENT",
                format!("department is required for role {role}"),
            )
        };
        match role {
            Role::Citizen => Err(CivicError::InvalidRole {
                message: "employees cannot have the citizen role".into(),
            }),
            Role::Staff => Ok(Self::Staff {
                department_id: department_id.ok_or_else(missing_department)?,
                service_area,
            }),
            Role::DepartmentHead => Ok(Self::DepartmentHead {
                department_id: department_id.ok_or_else(missing_department)?,
            }),
            Role::MunicipalAdmin => Ok(Self::MunicipalAdmin { admin_area }),
            Role::Admin => Ok(Self::Admin),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Staff { .. } => Role::Staff,
            Self::DepartmentHead { .. } => Role::DepartmentHead,
            Self::MunicipalAdmin { .. } => Role::MunicipalAdmin,
            Self::Admin => Role::Admin,
        }
    }

    pub fn department_id(&self) -> Option<Uuid> {
        match self {
            Self::Staff { department_id, .. } | Self::DepartmentHead { department_id } => {
                Some(*department_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub employee_id: Option<String>,
    pub admin_area: AreaSet,
    pub service_area: AreaSet,
    pub address: Option<Address>,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

impl CreateUser {
    pub fn citizen(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: phone.into(),
            password: password.into(),
            role: Role::Citizen,
            department_id: None,
            employee_id: None,
            admin_area: AreaSet::new(),
            service_area: AreaSet::new(),
            address: None,
            is_verified: false,
            verification_token_hash: None,
            verification_expires_at: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Raw replacement password.
    pub password: Option<String>,
    pub role: Option<Role>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    pub department_id: Option<Option<Uuid>>,
    pub admin_area: Option<AreaSet>,
    pub service_area: Option<AreaSet>,
    pub address: Option<Address>,
    pub notification_preferences: Option<NotificationPreferences>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub verification_token_hash: Option<Option<String>>,
    pub verification_expires_at: Option<Option<DateTime<Utc>>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_attempts: Option<u32>,
    pub lock_until: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Restrict to these roles; `None` means any role.
    pub roles: Option<Vec<Role>>,
    pub department_id: Option<Uuid>,
    /// Restrict to users whose address pincode lies in this set.
    pub address_pincodes: Option<AreaSet>,
    pub is_active: Option<bool>,
}

/// Basic e-mail shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> CivicResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid && !email.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(CivicError::validation(
            "INVALID_EMAIL",
            format!("not a valid e-mail address: {email}"),
        ))
    }
}

/// Phone numbers are exactly ten digits.
pub fn validate_phone(phone: &str) -> CivicResult<()> {
    if phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CivicError::validation(
            "INVALID_PHONE",
            "phone number must be exactly 10 digits",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pincode::parse_area;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(CivicError::InvalidRole { .. })
        ));
    }

    #[test]
    fn department_bearing_roles_need_a_department() {
        let err = EmployeeRole::from_parts(Role::Staff, None, AreaSet::new(), AreaSet::new())
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_DEPARTMENT");

        let dept = Uuid::new_v4();
        let head =
            EmployeeRole::from_parts(Role::DepartmentHead, Some(dept), AreaSet::new(), AreaSet::new())
                .unwrap();
        assert_eq!(head.role(), Role::DepartmentHead);
        assert_eq!(head.department_id(), Some(dept));
    }

    #[test]
    fn citizens_are_not_employees() {
        assert!(matches!(
            EmployeeRole::from_parts(Role::Citizen, None, AreaSet::new(), AreaSet::new()),
            Err(CivicError::InvalidRole { .. })
        ));
    }

    #[test]
    fn municipal_admin_keeps_its_area() {
        let area = parse_area("adminArea", ["560001"]).unwrap();
        let role =
            EmployeeRole::from_parts(Role::MunicipalAdmin, None, area.clone(), AreaSet::new())
                .unwrap();
        assert_eq!(role, EmployeeRole::MunicipalAdmin { admin_area: area });
        assert_eq!(role.department_id(), None);
    }

    #[test]
    fn email_and_phone_shapes() {
        assert!(validate_email("asha@example.in").is_ok());
        assert!(validate_email("asha@example").is_err());
        assert!(validate_email("@example.in").is_err());
        assert!(validate_email("a b@example.in").is_err());
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("98765").is_err());
        assert!(validate_phone("98765432ab").is_err());
    }
}
