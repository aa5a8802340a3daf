//! Department registry: definitions, rosters and head assignment.
//!
//! Name and code are unique among active departments and a user heads at
//! most one department. Writes that also touch the head's or a staff
//! member's user record go through a single repository call so that both
//! documents change together.

use std::collections::BTreeSet;

use chrono::Utc;
use civicdesk_core::access::{
    Action, Actor, DepartmentScope, DepartmentView, authorize, department_scope,
};
use civicdesk_core::error::{CivicError, CivicResult};
use civicdesk_core::models::complaint::{Category, ComplaintStatus};
use civicdesk_core::models::department::{
    CreateDepartment, DEFAULT_STAFF_ROLE, Department, DepartmentFilter, DepartmentStats,
    HEAD_STAFF_ROLE, MAX_CODE_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, Office, OfficeAddress,
    OfficeContact, StaffEntry, UpdateDepartment,
};
use civicdesk_core::models::user::Role;
use civicdesk_core::pincode::{parse_area, parse_pincode};
use civicdesk_core::repository::{
    ComplaintRepository, DepartmentRepository, PaginatedResult, Pagination, UserLink,
    UserRepository,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::patch::{double_option, required_text};

pub const DEFAULT_PAGE_SIZE: u64 = 25;
/// Upper bound for the unpaginated public pincode lookup.
const BY_PINCODE_LIMIT: u64 = 500;

/// Office as submitted; the pincode is validated on the way in.
#[derive(Debug, Clone, Deserialize)]
pub struct OfficeInput {
    #[serde(default)]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub categories: Vec<String>,
    #[serde(default)]
    pub service_area: Vec<String>,
    #[serde(default)]
    pub head_id: Option<Uuid>,
    #[serde(default)]
    pub offices: Vec<OfficeInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub service_area: Option<Vec<String>>,
    /// Absent = keep, `null` = clear, id = assign.
    #[serde(default, deserialize_with = "double_option")]
    pub head_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub offices: Option<Vec<OfficeInput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

pub struct DepartmentRegistry<D, U, C>
where
    D: DepartmentRepository,
    U: UserRepository,
    C: ComplaintRepository,
{
    departments: D,
    users: U,
    complaints: C,
}

impl<D, U, C> DepartmentRegistry<D, U, C>
where
    D: DepartmentRepository,
    U: UserRepository,
    C: ComplaintRepository,
{
    pub fn new(departments: D, users: U, complaints: C) -> Self {
        Self {
            departments,
            users,
            complaints,
        }
    }

    pub async fn create(&self, actor: &Actor, input: NewDepartment) -> CivicResult<Department> {
        authorize(actor, &Action::CreateDepartment)?;

        let name = required_text("name", &input.name, MAX_NAME_LEN)?;
        let code = normalize_code(&input.code)?;
        let description = optional_description(input.description)?;
        let categories = parse_categories(&input.categories)?;
        let service_area = parse_area("serviceArea", &input.service_area)?;
        let offices = parse_offices(input.offices)?;

        if self.departments.find_by_name(&name).await?.is_some() {
            return Err(CivicError::DuplicateName { name });
        }
        if self.departments.find_by_code(&code).await?.is_some() {
            return Err(CivicError::DuplicateCode { code });
        }
        if let Some(head_id) = input.head_id {
            self.check_head(head_id, None).await?;
        }

        let department = self
            .departments
            .create(CreateDepartment {
                name: name.clone(),
                code: code.clone(),
                description,
                categories,
                service_area,
                head_id: input.head_id,
                offices,
            })
            .await
            .map_err(|e| unique_violation(e, &name, &code))
            .map_err(|e| head_taken(e, input.head_id))?;

        info!(
            department_id = %department.id,
            name = %department.name,
            code = %department.code,
            actor_id = %actor.user_id,
            "Department created"
        );
        Ok(department)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: DepartmentPatch,
    ) -> CivicResult<Department> {
        authorize(actor, &Action::UpdateDepartment)?;
        let current = self.load(id).await?;

        let name = patch
            .name
            .map(|n| required_text("name", &n, MAX_NAME_LEN))
            .transpose()?;
        let code = patch.code.map(|c| normalize_code(&c)).transpose()?;
        let description = patch
            .description
            .map(|d| optional_description(Some(d)).map(Option::unwrap_or_default))
            .transpose()?;
        let categories = patch
            .categories
            .map(|c| parse_categories(&c))
            .transpose()?;
        let service_area = patch
            .service_area
            .map(|a| parse_area("serviceArea", &a))
            .transpose()?;
        let offices = patch.offices.map(parse_offices).transpose()?;

        if let Some(name) = &name {
            let taken = self.departments.find_by_name(name).await?;
            if taken.is_some_and(|other| other.id != id) {
                return Err(CivicError::DuplicateName { name: name.clone() });
            }
        }
        if let Some(code) = &code {
            let taken = self.departments.find_by_code(code).await?;
            if taken.is_some_and(|other| other.id != id) {
                return Err(CivicError::DuplicateCode { code: code.clone() });
            }
        }
        let head_change = patch.head_id.filter(|head| *head != current.head_id);
        if let Some(Some(head_id)) = head_change {
            self.check_head(head_id, Some(id)).await?;
        }
        let staff = head_change.map(|head| hand_over_head(current.staff, current.head_id, head));
        let previous_head = head_change.and(current.head_id);

        let name_for_error = name.clone().unwrap_or(current.name);
        let code_for_error = code.clone().unwrap_or(current.code);
        let department = self
            .departments
            .update(
                id,
                UpdateDepartment {
                    name,
                    code,
                    description,
                    categories,
                    service_area,
                    head_id: head_change,
                    offices,
                    staff,
                    previous_head,
                },
            )
            .await
            .map_err(|e| unique_violation(e, &name_for_error, &code_for_error))
            .map_err(|e| head_taken(e, head_change.flatten()))?;

        if let Some(head) = head_change {
            info!(
                department_id = %id,
                previous_head = ?previous_head,
                head = ?head,
                "Department head changed"
            );
        }
        info!(department_id = %id, actor_id = %actor.user_id, "Department updated");
        Ok(department)
    }

    /// Soft delete. Name and code become free for reuse.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> CivicResult<()> {
        authorize(actor, &Action::DeleteDepartment)?;
        self.departments.delete(id).await?;
        info!(department_id = %id, actor_id = %actor.user_id, "Department deleted");
        Ok(())
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> CivicResult<Department> {
        let department = self.load(id).await?;
        authorize(actor, &Action::ViewDepartment(DepartmentView::from(&department)))?;
        Ok(department)
    }

    /// Departments visible to `actor`. Municipal admins only see
    /// departments whose service area overlaps their admin area.
    pub async fn list(
        &self,
        actor: &Actor,
        query: DepartmentQuery,
    ) -> CivicResult<PaginatedResult<Department>> {
        let pagination = Pagination::page(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        let within_area = match department_scope(actor)? {
            DepartmentScope::All => None,
            DepartmentScope::Overlapping(area) if area.is_empty() => {
                return Ok(PaginatedResult {
                    items: Vec::new(),
                    total: 0,
                    offset: pagination.offset,
                    limit: pagination.limit,
                });
            }
            DepartmentScope::Overlapping(area) => Some(area),
        };

        let filter = DepartmentFilter {
            category: query
                .category
                .as_deref()
                .map(|c| c.trim().parse::<Category>())
                .transpose()?,
            pincode: query
                .pincode
                .as_deref()
                .map(|p| parse_pincode("pincode", p.trim()))
                .transpose()?,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            within_area,
        };
        self.departments.list(filter, pagination).await
    }

    /// Public lookup: every active department serving `pincode`.
    pub async fn list_by_pincode(&self, pincode: &str) -> CivicResult<Vec<Department>> {
        let pincode = parse_pincode("pincode", pincode.trim())?;
        let page = self
            .departments
            .list(
                DepartmentFilter::serving(pincode),
                Pagination {
                    offset: 0,
                    limit: BY_PINCODE_LIMIT,
                },
            )
            .await?;
        Ok(page.items)
    }

    pub async fn staff(
        &self,
        actor: &Actor,
        id: Uuid,
        include_inactive: bool,
    ) -> CivicResult<(Department, Vec<StaffEntry>)> {
        let department = self.load(id).await?;
        authorize(
            actor,
            &Action::ViewDepartmentStaff(DepartmentView::from(&department)),
        )?;
        let staff = department
            .staff
            .iter()
            .filter(|s| include_inactive || s.is_active)
            .cloned()
            .collect();
        Ok((department, staff))
    }

    /// Put a staff-role user on the roster. An inactive entry for the
    /// same user is reactivated instead of duplicated.
    pub async fn add_staff(
        &self,
        actor: &Actor,
        id: Uuid,
        user_id: Uuid,
        role_label: Option<String>,
    ) -> CivicResult<Department> {
        let department = self.load(id).await?;
        authorize(
            actor,
            &Action::ManageDepartmentStaff(DepartmentView::from(&department)),
        )?;

        let user = self.users.get_by_id(user_id).await?;
        if user.role != Role::Staff {
            return Err(CivicError::InvalidRole {
                message: "only users with the staff role can be added to a department".into(),
            });
        }

        let label = role_label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let now = Utc::now();
        let mut staff = department.staff;
        match staff.iter_mut().find(|s| s.user_id == user_id) {
            Some(entry) if entry.is_active => {
                return Err(CivicError::StaffExists { user_id });
            }
            Some(entry) => {
                entry.is_active = true;
                entry.joined_at = now;
                if let Some(label) = label {
                    entry.role = label;
                }
            }
            None => staff.push(StaffEntry {
                user_id,
                role: label.unwrap_or_else(|| DEFAULT_STAFF_ROLE.to_string()),
                is_active: true,
                joined_at: now,
            }),
        }

        let link = user.department_id.is_none().then_some(UserLink {
            user_id,
            department_id: Some(id),
            role: None,
        });
        let department = self.departments.save_staff(id, staff, link).await?;

        info!(department_id = %id, %user_id, actor_id = %actor.user_id, "Staff added");
        Ok(department)
    }

    /// Deactivate a roster entry. A user whose department is this one
    /// loses it and is demoted to citizen.
    pub async fn remove_staff(&self, actor: &Actor, id: Uuid, user_id: Uuid) -> CivicResult<()> {
        let department = self.load(id).await?;
        authorize(
            actor,
            &Action::ManageDepartmentStaff(DepartmentView::from(&department)),
        )?;

        let mut staff = department.staff;
        let entry = staff
            .iter_mut()
            .find(|s| s.user_id == user_id)
            .ok_or_else(|| CivicError::not_found("staff", user_id))?;
        entry.is_active = false;

        let link = match self.users.get_by_id(user_id).await {
            Ok(user) if user.department_id == Some(id) => Some(UserLink {
                user_id,
                department_id: None,
                role: Some(Role::Citizen),
            }),
            Ok(_) | Err(CivicError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        self.departments.save_staff(id, staff, link).await?;

        info!(department_id = %id, %user_id, actor_id = %actor.user_id, "Staff removed");
        Ok(())
    }

    /// Complaint counters, derived from the complaints routed to this
    /// department.
    pub async fn stats(&self, actor: &Actor, id: Uuid) -> CivicResult<DepartmentStats> {
        let department = self.load(id).await?;
        authorize(actor, &Action::ViewDepartment(DepartmentView::from(&department)))?;

        let complaints = self.complaints.list_by_department(id).await?;
        let mut stats = DepartmentStats {
            total_complaints: complaints.len() as u64,
            ..DepartmentStats::default()
        };
        let mut resolution_hours = Vec::new();
        for complaint in &complaints {
            let status = complaint.current_status();
            if status == ComplaintStatus::Resolved {
                stats.resolved_complaints += 1;
            }
            if !status.is_terminal() {
                stats.pending_complaints += 1;
            }
            if let Some(elapsed) = complaint.resolution_time() {
                resolution_hours.push(elapsed.num_seconds() as f64 / 3600.0);
            }
        }
        if !resolution_hours.is_empty() {
            stats.avg_resolution_hours =
                Some(resolution_hours.iter().sum::<f64>() / resolution_hours.len() as f64);
        }
        Ok(stats)
    }

    /// Load an active department; deleted ones are reported as missing.
    async fn load(&self, id: Uuid) -> CivicResult<Department> {
        let department = self.departments.get_by_id(id).await?;
        if !department.is_active {
            return Err(CivicError::not_found("department", id));
        }
        Ok(department)
    }

    /// A head must exist, hold a head-capable role and not already head
    /// another department.
    async fn check_head(&self, head_id: Uuid, department_id: Option<Uuid>) -> CivicResult<()> {
        let user = self.users.get_by_id(head_id).await?;
        if !matches!(user.role, Role::DepartmentHead | Role::Admin) {
            return Err(CivicError::InvalidRole {
                message: "department head must have the department_head or admin role".into(),
            });
        }
        let headed = self.departments.find_by_head(head_id).await?;
        if headed.is_some_and(|other| Some(other.id) != department_id) {
            return Err(CivicError::HeadAlreadyAssigned { user_id: head_id });
        }
        Ok(())
    }
}

fn normalize_code(code: &str) -> CivicResult<String> {
    required_text("code", code, MAX_CODE_LEN).map(|c| c.to_uppercase())
}

fn optional_description(description: Option<String>) -> CivicResult<Option<String>> {
    match description.map(|d| d.trim().to_string()) {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(CivicError::validation(
            "FIELD_TOO_LONG",
            format!("description cannot exceed {MAX_DESCRIPTION_LEN} characters"),
        )),
        Some(d) if d.is_empty() => Ok(None),
        other => Ok(other),
    }
}

fn parse_categories(values: &[String]) -> CivicResult<BTreeSet<Category>> {
    let categories = values
        .iter()
        .map(|c| c.trim().parse::<Category>())
        .collect::<CivicResult<BTreeSet<_>>>()?;
    if categories.is_empty() {
        return Err(CivicError::validation(
            "MISSING_FIELDS",
            "at least one category is required",
        ));
    }
    Ok(categories)
}

/// Every office pincode is checked; all offenders are reported together.
fn parse_offices(offices: Vec<OfficeInput>) -> CivicResult<Vec<Office>> {
    parse_area(
        "offices.address.pincode",
        offices.iter().map(|o| o.pincode.trim()),
    )?;

    offices
        .into_iter()
        .map(|o| {
            Ok(Office {
                kind: o
                    .kind
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| "main".to_string()),
                name: required_text("offices.name", &o.name, MAX_NAME_LEN)?,
                address: OfficeAddress {
                    street: o.street,
                    area: o.area,
                    city: required_text("offices.address.city", &o.city, MAX_NAME_LEN)?,
                    state: required_text("offices.address.state", &o.state, MAX_NAME_LEN)?,
                    pincode: parse_pincode("offices.address.pincode", o.pincode.trim())?,
                },
                contact: OfficeContact {
                    phone: o.phone,
                    email: o.email,
                },
            })
        })
        .collect()
}

/// A unique index fired between the pre-check and the write.
fn unique_violation(err: CivicError, name: &str, code: &str) -> CivicError {
    match err {
        CivicError::DuplicateEntry { field } if field == "name" => CivicError::DuplicateName {
            name: name.to_string(),
        },
        CivicError::DuplicateEntry { field } if field == "code" => CivicError::DuplicateCode {
            code: code.to_string(),
        },
        other => other,
    }
}

/// The head index fired: the incoming head was claimed by another
/// department after `check_head` ran.
fn head_taken(err: CivicError, head_id: Option<Uuid>) -> CivicError {
    match (err, head_id) {
        (CivicError::DuplicateEntry { field }, Some(user_id)) if field == "head_id" => {
            CivicError::HeadAlreadyAssigned { user_id }
        }
        (other, _) => other,
    }
}

/// Roster after the head slot moves from `previous` to `next`. The
/// outgoing head's entry is deactivated; the incoming head gets an
/// active `head` entry, reusing an existing one if present.
fn hand_over_head(
    mut staff: Vec<StaffEntry>,
    previous: Option<Uuid>,
    next: Option<Uuid>,
) -> Vec<StaffEntry> {
    if let Some(previous) = previous {
        for entry in staff.iter_mut().filter(|s| s.user_id == previous) {
            entry.is_active = false;
        }
    }
    if let Some(next) = next {
        let now = Utc::now();
        match staff.iter_mut().find(|s| s.user_id == next) {
            Some(entry) => {
                entry.is_active = true;
                entry.role = HEAD_STAFF_ROLE.to_string();
                entry.joined_at = now;
            }
            None => staff.push(StaffEntry {
                user_id: next,
                role: HEAD_STAFF_ROLE.to_string(),
                is_active: true,
                joined_at: now,
            }),
        }
    }
    staff
}
