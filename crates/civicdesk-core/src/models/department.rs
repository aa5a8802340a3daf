//! Department domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::complaint::Category;
use crate::pincode::{AreaSet, Pincode};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CODE_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const DEFAULT_STAFF_ROLE: &str = "staff";
pub const HEAD_STAFF_ROLE: &str = "head";

/// One roster line. Entries are never removed, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffEntry {
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeAddress {
    pub street: Option<String>,
    pub area: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfficeContact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    /// Office kind, `main` unless stated otherwise.
    pub kind: String,
    pub name: String,
    pub address: OfficeAddress,
    pub contact: OfficeContact,
}

/// Complaint counters derived from the complaint collection on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentStats {
    pub total_complaints: u64,
    pub resolved_complaints: u64,
    pub pending_complaints: u64,
    /// Mean resolution time in hours over resolved complaints.
    pub avg_resolution_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub categories: BTreeSet<Category>,
    pub service_area: AreaSet,
    pub head_id: Option<Uuid>,
    pub staff: Vec<StaffEntry>,
    pub offices: Vec<Office>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn staff_entry(&self, user_id: Uuid) -> Option<&StaffEntry> {
        self.staff.iter().find(|s| s.user_id == user_id)
    }

    pub fn active_staff(&self) -> impl Iterator<Item = &StaffEntry> {
        self.staff.iter().filter(|s| s.is_active)
    }

    pub fn serves(&self, pincode: &Pincode) -> bool {
        self.service_area.contains(pincode)
    }
}

#[derive(Debug, Clone)]
pub struct CreateDepartment {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub categories: BTreeSet<Category>,
    pub service_area: AreaSet,
    pub head_id: Option<Uuid>,
    pub offices: Vec<Office>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub categories: Option<BTreeSet<Category>>,
    pub service_area: Option<AreaSet>,
    /// `Some(Some(id))` = assign, `Some(None)` = clear, `None` = no change.
    pub head_id: Option<Option<Uuid>>,
    pub offices: Option<Vec<Office>>,
    /// Roster written in the same transaction as a head change.
    pub staff: Option<Vec<StaffEntry>>,
    /// Outgoing head; their department link is cleared with the write.
    pub previous_head: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentFilter {
    pub category: Option<Category>,
    pub pincode: Option<Pincode>,
    /// Case-insensitive match on name, code or description.
    pub search: Option<String>,
    /// Restrict to departments whose service area intersects this set.
    pub within_area: Option<AreaSet>,
}

impl DepartmentFilter {
    /// Departments whose service area contains `pincode`.
    pub fn serving(pincode: Pincode) -> Self {
        Self {
            pincode: Some(pincode),
            ..Self::default()
        }
    }
}
