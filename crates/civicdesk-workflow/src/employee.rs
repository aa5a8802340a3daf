//! Employee management: staff, department heads, municipal admins and
//! admins, scoped by the caller's role and jurisdiction.

use civicdesk_core::access::{
    Action, Actor, EmployeeScope, EmployeeView, authorize, employee_scope,
};
use civicdesk_core::error::{CivicError, CivicResult};
use civicdesk_core::models::address::{Address, GeoPoint};
use civicdesk_core::models::department::{DEFAULT_STAFF_ROLE, HEAD_STAFF_ROLE};
use civicdesk_core::models::user::{
    CreateUser, EmployeeRole, NotificationPreferences, Role, UpdateUser, User, UserFilter,
    validate_email, validate_phone,
};
use civicdesk_core::pincode::{AreaSet, parse_area, parse_pincode};
use civicdesk_core::repository::{
    DepartmentEnrollment, DepartmentRepository, PaginatedResult, Pagination, UserRepository,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::patch::required_text;

const NAME_MAX_LEN: usize = 50;
const EMPLOYEE_ID_MAX_LEN: usize = 50;
const CITY_MAX_LEN: usize = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 25;

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl AddressInput {
    pub fn into_address(self) -> CivicResult<Address> {
        let missing = || {
            CivicError::validation(
                "MISSING_ADDRESS",
                "city, state and pincode are required in address",
            )
        };
        let city = self.city.trim();
        let state = self.state.trim();
        let pincode = self.pincode.trim();
        if city.is_empty() || state.is_empty() || pincode.is_empty() {
            return Err(missing());
        }
        let coordinates = self
            .coordinates
            .map(|c| GeoPoint::new(c.longitude, c.latitude))
            .transpose()?;
        Ok(Address {
            street: self
                .street
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            city: required_text("address.city", city, CITY_MAX_LEN)?,
            state: required_text("address.state", state, CITY_MAX_LEN)?,
            pincode: parse_pincode("address.pincode", pincode)?,
            coordinates,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
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
    pub role: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    /// Only kept for staff.
    #[serde(default)]
    pub service_area: Vec<String>,
    /// Only kept for municipal admins.
    #[serde(default)]
    pub admin_area: Vec<String>,
}

/// Fields an employee record may change after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeePatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub notification_preferences: Option<NotificationPreferences>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub service_area: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeQuery {
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

pub struct EmployeeService<U, D>
where
    U: UserRepository,
    D: DepartmentRepository,
{
    users: U,
    departments: D,
    min_password_length: usize,
}

impl<U, D> EmployeeService<U, D>
where
    U: UserRepository,
    D: DepartmentRepository,
{
    pub fn new(users: U, departments: D, min_password_length: usize) -> Self {
        Self {
            users,
            departments,
            min_password_length,
        }
    }

    /// Create an employee account. Staff and department heads are put on
    /// their department's roster in the same write; a head also takes the
    /// department's head slot.
    ///
    /// The account starts unverified. Sending the verification mail is up
    /// to the caller.
    pub async fn create(&self, actor: &Actor, input: NewEmployee) -> CivicResult<User> {
        let required = [
            &input.first_name,
            &input.last_name,
            &input.email,
            &input.phone,
            &input.password,
            &input.role,
            &input.employee_id,
        ];
        if required.iter().any(|v| v.trim().is_empty()) {
            return Err(CivicError::validation(
                "MISSING_FIELDS",
                "first name, last name, email, phone, password, role and employee id are required",
            ));
        }

        let role: Role = input.role.trim().parse()?;
        let service_area = if role == Role::Staff {
            parse_area("serviceArea", &input.service_area)?
        } else {
            AreaSet::new()
        };
        let admin_area = if role == Role::MunicipalAdmin {
            parse_area("adminArea", &input.admin_area)?
        } else {
            AreaSet::new()
        };
        let employee_role =
            EmployeeRole::from_parts(role, input.department_id, admin_area, service_area)?;
        authorize(
            actor,
            &Action::CreateEmployee {
                role,
                department_id: employee_role.department_id(),
            },
        )?;

        let address = input
            .address
            .ok_or_else(|| {
                CivicError::validation(
                    "MISSING_ADDRESS",
                    "city, state and pincode are required in address",
                )
            })?
            .into_address()?;

        let first_name = required_text("firstName", &input.first_name, NAME_MAX_LEN)?;
        let last_name = required_text("lastName", &input.last_name, NAME_MAX_LEN)?;
        let email = input.email.trim().to_lowercase();
        validate_email(&email)?;
        let phone = input.phone.trim().to_string();
        validate_phone(&phone)?;
        let employee_id = required_text("employeeId", &input.employee_id, EMPLOYEE_ID_MAX_LEN)?;
        if input.password.chars().count() < self.min_password_length {
            return Err(CivicError::validation(
                "WEAK_PASSWORD",
                format!(
                    "password must be at least {} characters",
                    self.min_password_length
                ),
            ));
        }

        self.ensure_unused(&email, &phone, &employee_id).await?;

        if let Some(department_id) = employee_role.department_id() {
            let department = self.departments.get_by_id(department_id).await?;
            if !department.is_active {
                return Err(CivicError::not_found("department", department_id));
            }
            if role == Role::DepartmentHead && department.head_id.is_some() {
                return Err(CivicError::DepartmentHeadExists { department_id });
            }
        }

        let (admin_area, service_area) = match &employee_role {
            EmployeeRole::MunicipalAdmin { admin_area } => (admin_area.clone(), AreaSet::new()),
            EmployeeRole::Staff { service_area, .. } => (AreaSet::new(), service_area.clone()),
            _ => (AreaSet::new(), AreaSet::new()),
        };
        let create = CreateUser {
            first_name,
            last_name,
            email,
            phone,
            password: input.password,
            role,
            department_id: employee_role.department_id(),
            employee_id: Some(employee_id),
            admin_area,
            service_area,
            address: Some(address),
            is_verified: false,
            verification_token_hash: None,
            verification_expires_at: None,
        };

        let user = match employee_role {
            EmployeeRole::Staff { department_id, .. } => {
                self.users
                    .create_enrolled(
                        create,
                        DepartmentEnrollment {
                            department_id,
                            staff_role: DEFAULT_STAFF_ROLE.to_string(),
                            as_head: false,
                        },
                    )
                    .await?
            }
            EmployeeRole::DepartmentHead { department_id } => {
                self.users
                    .create_enrolled(
                        create,
                        DepartmentEnrollment {
                            department_id,
                            staff_role: HEAD_STAFF_ROLE.to_string(),
                            as_head: true,
                        },
                    )
                    .await
                    .map_err(|e| match e {
                        CivicError::DuplicateEntry { field } if field == "department_head" => {
                            CivicError::DepartmentHeadExists { department_id }
                        }
                        other => other,
                    })?
            }
            EmployeeRole::MunicipalAdmin { .. } | EmployeeRole::Admin => {
                self.users.create(create).await?
            }
        };

        info!(
            user_id = %user.id,
            role = %user.role,
            employee_id = user.employee_id.as_deref().unwrap_or_default(),
            actor_id = %actor.user_id,
            "Employee created"
        );
        Ok(user)
    }

    /// Employees visible to `actor`, newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        query: EmployeeQuery,
    ) -> CivicResult<PaginatedResult<User>> {
        let mut filter = UserFilter {
            roles: Some(employee_roles()),
            is_active: query.is_active,
            department_id: query.department_id,
            ..UserFilter::default()
        };
        match employee_scope(actor)? {
            EmployeeScope::All => {}
            EmployeeScope::Pincodes(area) => filter.address_pincodes = Some(area),
            EmployeeScope::Department(id) => filter.department_id = Some(id),
        }
        if let Some(role) = query.role.as_deref() {
            let role: Role = role.trim().parse()?;
            if !role.is_employee() {
                return Err(CivicError::InvalidRole {
                    message: format!("{role} is not an employee role"),
                });
            }
            filter.roles = Some(vec![role]);
        }

        let pagination = Pagination::page(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        self.users.list(filter, pagination).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> CivicResult<User> {
        let employee = self.load(id).await?;
        authorize(actor, &Action::ViewEmployee(EmployeeView::from(&employee)))?;
        Ok(employee)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, patch: EmployeePatch) -> CivicResult<User> {
        let employee = self.load(id).await?;
        authorize(actor, &Action::UpdateEmployee(EmployeeView::from(&employee)))?;

        if actor.user_id == id && (patch.is_active.is_some() || patch.is_verified.is_some()) {
            return Err(CivicError::forbidden(
                "you cannot change your own activation or verification state",
            ));
        }

        let mut update = UpdateUser {
            first_name: patch
                .first_name
                .map(|n| required_text("firstName", &n, NAME_MAX_LEN))
                .transpose()?,
            last_name: patch
                .last_name
                .map(|n| required_text("lastName", &n, NAME_MAX_LEN))
                .transpose()?,
            address: patch.address.map(AddressInput::into_address).transpose()?,
            notification_preferences: patch.notification_preferences,
            is_active: patch.is_active,
            is_verified: patch.is_verified,
            ..UpdateUser::default()
        };

        if let Some(email) = patch.email {
            let email = email.trim().to_lowercase();
            validate_email(&email)?;
            if email != employee.email {
                ensure_free(self.users.get_by_email(&email).await, id, "email")?;
                update.email = Some(email);
            }
        }
        if let Some(phone) = patch.phone {
            let phone = phone.trim().to_string();
            validate_phone(&phone)?;
            if phone != employee.phone {
                ensure_free(self.users.get_by_phone(&phone).await, id, "phone")?;
                update.phone = Some(phone);
            }
        }
        if let Some(service_area) = patch.service_area {
            if employee.role != Role::Staff {
                return Err(CivicError::InvalidRole {
                    message: "only staff have a service area".into(),
                });
            }
            update.service_area = Some(parse_area("serviceArea", &service_area)?);
        }

        let user = self.users.update(id, update).await?;
        info!(user_id = %id, actor_id = %actor.user_id, "Employee updated");
        Ok(user)
    }

    /// Soft delete; the e-mail address becomes available again.
    pub async fn deactivate(&self, actor: &Actor, id: Uuid) -> CivicResult<User> {
        let employee = self.load(id).await?;
        authorize(
            actor,
            &Action::DeactivateEmployee(EmployeeView::from(&employee)),
        )?;
        let user = self.users.deactivate(id).await?;
        info!(user_id = %id, actor_id = %actor.user_id, "Employee deactivated");
        Ok(user)
    }

    async fn load(&self, id: Uuid) -> CivicResult<User> {
        let user = self.users.get_by_id(id).await.map_err(|e| match e {
            CivicError::NotFound { .. } => CivicError::not_found("employee", id),
            other => other,
        })?;
        if !user.role.is_employee() {
            return Err(CivicError::validation(
                "NOT_EMPLOYEE",
                "the specified user is not an employee",
            ));
        }
        Ok(user)
    }

    async fn ensure_unused(&self, email: &str, phone: &str, employee_id: &str) -> CivicResult<()> {
        let checks = [
            ("email", self.users.get_by_email(email).await),
            ("phone", self.users.get_by_phone(phone).await),
            ("employee_id", self.users.get_by_employee_id(employee_id).await),
        ];
        for (field, found) in checks {
            match found {
                Ok(_) => {
                    return Err(CivicError::DuplicateEntry {
                        field: field.to_string(),
                    });
                }
                Err(CivicError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A lookup hit on someone other than `id` means the value is taken.
fn ensure_free(found: CivicResult<User>, id: Uuid, field: &str) -> CivicResult<()> {
    match found {
        Ok(other) if other.id != id => Err(CivicError::DuplicateEntry {
            field: field.to_string(),
        }),
        Ok(_) | Err(CivicError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

fn employee_roles() -> Vec<Role> {
    Role::ALL.into_iter().filter(Role::is_employee).collect()
}
