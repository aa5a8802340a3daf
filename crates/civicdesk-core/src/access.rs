//! Access control evaluator.
//!
//! [`decide`] is a pure function of the acting user's role, department
//! and admin area, and of the jurisdiction-bearing fields of the target.
//! Nothing here touches storage; callers load the target first and pass
//! a borrowed view of it.

use tracing::warn;
use uuid::Uuid;

use crate::error::{CivicError, CivicResult};
use crate::models::complaint::Complaint;
use crate::models::department::Department;
use crate::models::user::{Role, User};
use crate::pincode::{AreaSet, Pincode, overlaps};

/// The authenticated user an action is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub admin_area: AreaSet,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            department_id: user.department_id,
            admin_area: if user.role == Role::MunicipalAdmin {
                user.admin_area.clone()
            } else {
                AreaSet::new()
            },
        }
    }
}

impl Actor {
    pub fn has_jurisdiction(&self, pincode: &Pincode) -> bool {
        self.role == Role::MunicipalAdmin && self.admin_area.contains(pincode)
    }

    fn covers(&self, area: &AreaSet) -> bool {
        self.role == Role::MunicipalAdmin && overlaps(&self.admin_area, area)
    }

    fn in_department(&self, department_id: Uuid) -> bool {
        self.department_id == Some(department_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DepartmentView<'a> {
    pub id: Uuid,
    pub head_id: Option<Uuid>,
    pub service_area: &'a AreaSet,
}

impl<'a> From<&'a Department> for DepartmentView<'a> {
    fn from(d: &'a Department) -> Self {
        Self {
            id: d.id,
            head_id: d.head_id,
            service_area: &d.service_area,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EmployeeView<'a> {
    pub id: Uuid,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub pincode: Option<&'a Pincode>,
}

impl<'a> From<&'a User> for EmployeeView<'a> {
    fn from(u: &'a User) -> Self {
        Self {
            id: u.id,
            role: u.role,
            department_id: u.department_id,
            pincode: u.address_pincode(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComplaintView<'a> {
    pub user_id: Uuid,
    pub pin_code: &'a Pincode,
    pub department_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

impl<'a> From<&'a Complaint> for ComplaintView<'a> {
    fn from(c: &'a Complaint) -> Self {
        Self {
            user_id: c.user_id,
            pin_code: c.pin_code(),
            department_id: c.department_id,
            assigned_to: c.assigned_to,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    CreateDepartment,
    UpdateDepartment,
    DeleteDepartment,
    ViewDepartment(DepartmentView<'a>),
    ViewDepartmentStaff(DepartmentView<'a>),
    ManageDepartmentStaff(DepartmentView<'a>),
    CreateEmployee {
        role: Role,
        department_id: Option<Uuid>,
    },
    ListEmployees,
    ViewEmployee(EmployeeView<'a>),
    UpdateEmployee(EmployeeView<'a>),
    DeactivateEmployee(EmployeeView<'a>),
    FileComplaint,
    ViewComplaint(ComplaintView<'a>),
    UpdateComplaintStatus(ComplaintView<'a>),
    AssignComplaint(ComplaintView<'a>),
    ManageAdminArea,
    /// Account administration across every role.
    ManageUsers,
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateDepartment => "create_department",
            Action::UpdateDepartment => "update_department",
            Action::DeleteDepartment => "delete_department",
            Action::ViewDepartment(_) => "view_department",
            Action::ViewDepartmentStaff(_) => "view_department_staff",
            Action::ManageDepartmentStaff(_) => "manage_department_staff",
            Action::CreateEmployee { .. } => "create_employee",
            Action::ListEmployees => "list_employees",
            Action::ViewEmployee(_) => "view_employee",
            Action::UpdateEmployee(_) => "update_employee",
            Action::DeactivateEmployee(_) => "deactivate_employee",
            Action::FileComplaint => "file_complaint",
            Action::ViewComplaint(_) => "view_complaint",
            Action::UpdateComplaintStatus(_) => "update_complaint_status",
            Action::AssignComplaint(_) => "assign_complaint",
            Action::ManageAdminArea => "manage_admin_area",
            Action::ManageUsers => "manage_users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> CivicResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(CivicError::Forbidden { reason }),
        }
    }
}

fn allow_if(condition: bool, reason: &str) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(reason.to_string())
    }
}

fn deny(reason: &str) -> Decision {
    Decision::Deny(reason.to_string())
}

const OUTSIDE_AREA: &str = "target is outside your admin area";
const OTHER_DEPARTMENT: &str = "target belongs to another department";
const ADMIN_ONLY: &str = "admin role required";

pub fn decide(actor: &Actor, action: &Action<'_>) -> Decision {
    use Role::*;

    match *action {
        Action::CreateDepartment | Action::UpdateDepartment | Action::DeleteDepartment => {
            allow_if(actor.role == Admin, ADMIN_ONLY)
        }

        Action::ViewDepartment(dept) => match actor.role {
            Admin | DepartmentHead | Staff => Decision::Allow,
            MunicipalAdmin => allow_if(actor.covers(dept.service_area), OUTSIDE_AREA),
            Citizen => deny("staff access required"),
        },

        Action::ViewDepartmentStaff(dept) => match actor.role {
            Admin => Decision::Allow,
            MunicipalAdmin => allow_if(actor.covers(dept.service_area), OUTSIDE_AREA),
            DepartmentHead => allow_if(
                dept.head_id == Some(actor.user_id) || actor.in_department(dept.id),
                OTHER_DEPARTMENT,
            ),
            Staff => allow_if(actor.in_department(dept.id), OTHER_DEPARTMENT),
            Citizen => deny("staff access required"),
        },

        Action::ManageDepartmentStaff(dept) => match actor.role {
            Admin => Decision::Allow,
            MunicipalAdmin => allow_if(actor.covers(dept.service_area), OUTSIDE_AREA),
            DepartmentHead => allow_if(
                dept.head_id == Some(actor.user_id),
                "only the head of this department may manage its staff",
            ),
            Staff | Citizen => deny("department head or admin role required"),
        },

        Action::CreateEmployee {
            role,
            department_id,
        } => match actor.role {
            Admin => allow_if(role.is_employee(), "employees cannot be citizens"),
            MunicipalAdmin => allow_if(
                matches!(role, Staff | DepartmentHead),
                "municipal admins may only create staff and department heads",
            ),
            DepartmentHead => allow_if(
                role == Staff && department_id.is_some() && department_id == actor.department_id,
                "department heads may only create staff for their own department",
            ),
            Staff | Citizen => deny("department head or admin role required"),
        },

        Action::ListEmployees => allow_if(
            matches!(actor.role, Admin | MunicipalAdmin | DepartmentHead),
            "not permitted to list employees",
        ),

        Action::ViewEmployee(emp) | Action::UpdateEmployee(emp) => match actor.role {
            Admin => Decision::Allow,
            MunicipalAdmin => allow_if(
                emp.pincode.is_some_and(|p| actor.has_jurisdiction(p)),
                OUTSIDE_AREA,
            ),
            DepartmentHead => allow_if(
                emp.id == actor.user_id
                    || emp.department_id.is_some_and(|d| actor.in_department(d)),
                OTHER_DEPARTMENT,
            ),
            Staff => allow_if(emp.id == actor.user_id, "staff may only access themselves"),
            Citizen => deny("employee access required"),
        },

        Action::DeactivateEmployee(emp) => match actor.role {
            Admin => allow_if(emp.id != actor.user_id, "cannot deactivate yourself"),
            MunicipalAdmin => allow_if(
                emp.pincode.is_some_and(|p| actor.has_jurisdiction(p)),
                OUTSIDE_AREA,
            ),
            DepartmentHead => allow_if(
                emp.id != actor.user_id
                    && emp.department_id.is_some_and(|d| actor.in_department(d)),
                OTHER_DEPARTMENT,
            ),
            Staff | Citizen => deny("department head or admin role required"),
        },

        Action::FileComplaint => Decision::Allow,

        Action::ViewComplaint(c) => match actor.role {
            Admin => Decision::Allow,
            MunicipalAdmin => allow_if(actor.has_jurisdiction(c.pin_code), OUTSIDE_AREA),
            DepartmentHead => allow_if(
                c.department_id.is_some_and(|d| actor.in_department(d)),
                OTHER_DEPARTMENT,
            ),
            Staff => allow_if(
                c.assigned_to == Some(actor.user_id),
                "complaint is not assigned to you",
            ),
            Citizen => allow_if(c.user_id == actor.user_id, "not your complaint"),
        },

        Action::UpdateComplaintStatus(c) => match actor.role {
            Admin => Decision::Allow,
            MunicipalAdmin => allow_if(actor.has_jurisdiction(c.pin_code), OUTSIDE_AREA),
            DepartmentHead => allow_if(
                c.department_id.is_some_and(|d| actor.in_department(d)),
                OTHER_DEPARTMENT,
            ),
            Staff => allow_if(
                c.assigned_to == Some(actor.user_id),
                "complaint is not assigned to you",
            ),
            Citizen => deny("citizens cannot change complaint status"),
        },

        Action::AssignComplaint(c) => match actor.role {
            MunicipalAdmin => allow_if(
                actor.has_jurisdiction(c.pin_code),
                "you do not have permission to assign staff to complaints in this area",
            ),
            _ => deny("municipal admin role required"),
        },

        Action::ManageAdminArea | Action::ManageUsers => allow_if(actor.role == Admin, ADMIN_ONLY),
    }
}

/// [`decide`], turned into a `Forbidden` error on denial and logged.
pub fn authorize(actor: &Actor, action: &Action<'_>) -> CivicResult<()> {
    let decision = decide(actor, action);
    if let Decision::Deny(reason) = &decision {
        warn!(
            user_id = %actor.user_id,
            role = %actor.role,
            action = action.name(),
            %reason,
            "Access denied"
        );
    }
    decision.into_result()
}

/// Which employees an actor may list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeScope {
    All,
    Pincodes(AreaSet),
    Department(Uuid),
}

pub fn employee_scope(actor: &Actor) -> CivicResult<EmployeeScope> {
    authorize(actor, &Action::ListEmployees)?;
    match actor.role {
        Role::Admin => Ok(EmployeeScope::All),
        Role::MunicipalAdmin if actor.admin_area.is_empty() => Err(CivicError::NoJurisdiction {
            reason: "no pincodes assigned to this municipal admin".into(),
        }),
        Role::MunicipalAdmin => Ok(EmployeeScope::Pincodes(actor.admin_area.clone())),
        _ => actor
            .department_id
            .map(EmployeeScope::Department)
            .ok_or_else(|| {
                CivicError::validation("NO_DEPARTMENT", "you are not assigned to a department")
            }),
    }
}

/// Which departments an actor may list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentScope {
    All,
    /// Only departments whose service area intersects this set. An empty
    /// set matches nothing.
    Overlapping(AreaSet),
}

pub fn department_scope(actor: &Actor) -> CivicResult<DepartmentScope> {
    match actor.role {
        Role::Admin | Role::DepartmentHead | Role::Staff => Ok(DepartmentScope::All),
        Role::MunicipalAdmin => Ok(DepartmentScope::Overlapping(actor.admin_area.clone())),
        Role::Citizen => Err(CivicError::forbidden("staff access required")),
    }
}
