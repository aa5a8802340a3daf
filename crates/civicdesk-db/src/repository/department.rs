//! SurrealDB implementation of [`DepartmentRepository`].
//!
//! Writes that also touch a user record (head assignment, roster
//! changes) are issued as one `BEGIN TRANSACTION ... COMMIT` query.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use civicdesk_core::error::CivicResult;
use civicdesk_core::models::complaint::Category;
use civicdesk_core::models::department::{
    CreateDepartment, Department, DepartmentFilter, HEAD_STAFF_ROLE, StaffEntry,
    UpdateDepartment,
};
use civicdesk_core::repository::{DepartmentRepository, PaginatedResult, Pagination, UserLink};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    CountRow, area_strings, from_json, parse_area, parse_optional_uuid, parse_uuid, to_json,
};
use crate::error::DbError;

const ENTITY: &str = "department";

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('department', $id)";

#[derive(Debug, SurrealValue)]
struct DepartmentRow {
    record_id: String,
    name: String,
    code: String,
    description: Option<String>,
    categories: Vec<String>,
    service_area: Vec<String>,
    head_id: Option<String>,
    staff: serde_json::Value,
    offices: serde_json::Value,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DepartmentRow {
    fn try_into_department(self) -> Result<Department, DbError> {
        let categories = self
            .categories
            .iter()
            .map(|c| c.parse::<Category>().map_err(|e| DbError::corrupt(ENTITY, e)))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Department {
            id: parse_uuid(ENTITY, &self.record_id)?,
            name: self.name,
            code: self.code,
            description: self.description,
            categories,
            service_area: parse_area(ENTITY, self.service_area)?,
            head_id: parse_optional_uuid(ENTITY, self.head_id)?,
            staff: from_json(ENTITY, self.staff)?,
            offices: from_json(ENTITY, self.offices)?,
            is_active: self.is_active,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn category_strings(categories: &BTreeSet<Category>) -> Vec<String> {
    categories.iter().map(|c| c.as_str().to_string()).collect()
}

/// SurrealDB implementation of the Department repository.
#[derive(Clone)]
pub struct SurrealDepartmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDepartmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_active(&self, field: &'static str, value: &str) -> CivicResult<Option<Department>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM department \
             WHERE {field} = $value AND is_active = true LIMIT 1"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DepartmentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(DepartmentRow::try_into_department)
            .transpose()?)
    }
}

impl<C: Connection> DepartmentRepository for SurrealDepartmentRepository<C> {
    async fn create(&self, input: CreateDepartment) -> CivicResult<Department> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        // The head starts on the roster.
        let staff: Vec<StaffEntry> = input
            .head_id
            .map(|user_id| StaffEntry {
                user_id,
                role: HEAD_STAFF_ROLE.into(),
                is_active: true,
                joined_at: Utc::now(),
            })
            .into_iter()
            .collect();

        let link_head = if input.head_id.is_some() {
            "UPDATE type::record('user', $head_id) SET \
             department_id = $id, updated_at = time::now();"
        } else {
            ""
        };
        let query = format!(
            "BEGIN TRANSACTION;\n\
             CREATE type::record('department', $id) SET \
             name = $name, code = $code, description = $description, \
             categories = $categories, service_area = $service_area, \
             head_id = $head_id, staff = $staff, offices = $offices, \
             is_active = true, created_at = time::now(), \
             updated_at = time::now();\n\
             {link_head}\n\
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .bind(("name", input.name))
            .bind(("code", input.code))
            .bind(("description", input.description))
            .bind(("categories", category_strings(&input.categories)))
            .bind(("service_area", area_strings(&input.service_area)))
            .bind(("head_id", input.head_id.map(|h| h.to_string())))
            .bind(("staff", to_json(ENTITY, &staff)?))
            .bind(("offices", to_json(ENTITY, &input.offices)?))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> CivicResult<Department> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DepartmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id_str))?;
        Ok(row.try_into_department()?)
    }

    async fn find_by_name(&self, name: &str) -> CivicResult<Option<Department>> {
        self.find_active("name", name).await
    }

    async fn find_by_code(&self, code: &str) -> CivicResult<Option<Department>> {
        self.find_active("code", code).await
    }

    async fn find_by_head(&self, user_id: Uuid) -> CivicResult<Option<Department>> {
        self.find_active("head_id", &user_id.to_string()).await
    }

    async fn update(&self, id: Uuid, input: UpdateDepartment) -> CivicResult<Department> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.code.is_some() {
            sets.push("code = $code");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.categories.is_some() {
            sets.push("categories = $categories");
        }
        if input.service_area.is_some() {
            sets.push("service_area = $service_area");
        }
        if input.head_id.is_some() {
            sets.push("head_id = $head_id");
        }
        if input.offices.is_some() {
            sets.push("offices = $offices");
        }
        if input.staff.is_some() {
            sets.push("staff = $staff");
        }
        sets.push("updated_at = time::now()");

        // The outgoing head loses the department before the incoming one
        // gains it, so a head re-assigned to itself keeps its link.
        let unlink_previous = if input.previous_head.is_some() {
            "UPDATE type::record('user', $previous_head) SET \
             department_id = NONE, updated_at = time::now() \
             WHERE department_id = $id;"
        } else {
            ""
        };
        let link_head = match input.head_id {
            Some(Some(_)) => {
                "UPDATE type::record('user', $head_id) SET \
                 department_id = $id, updated_at = time::now();"
            }
            _ => "",
        };
        let query = format!(
            "BEGIN TRANSACTION;\n\
             UPDATE type::record('department', $id) SET {} \
             WHERE is_active = true;\n\
             {unlink_previous}\n\
             {link_head}\n\
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(code) = input.code {
            builder = builder.bind(("code", code));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(categories) = input.categories {
            builder = builder.bind(("categories", category_strings(&categories)));
        }
        if let Some(service_area) = input.service_area {
            builder = builder.bind(("service_area", area_strings(&service_area)));
        }
        if let Some(head_id) = input.head_id {
            builder = builder.bind(("head_id", head_id.map(|h| h.to_string())));
        }
        if let Some(offices) = input.offices {
            builder = builder.bind(("offices", to_json(ENTITY, &offices)?));
        }
        if let Some(staff) = input.staff {
            builder = builder.bind(("staff", to_json(ENTITY, &staff)?));
        }
        if let Some(previous_head) = input.previous_head {
            builder = builder.bind(("previous_head", previous_head.to_string()));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.get_by_id(id).await
    }

    async fn save_staff(
        &self,
        id: Uuid,
        staff: Vec<StaffEntry>,
        link: Option<UserLink>,
    ) -> CivicResult<Department> {
        let link_user = match &link {
            Some(UserLink { role: Some(_), .. }) => {
                "UPDATE type::record('user', $link_user) SET \
                 department_id = $link_department, role = $link_role, \
                 updated_at = time::now();"
            }
            Some(_) => {
                "UPDATE type::record('user', $link_user) SET \
                 department_id = $link_department, updated_at = time::now();"
            }
            None => "",
        };
        let query = format!(
            "BEGIN TRANSACTION;\n\
             UPDATE type::record('department', $id) SET \
             staff = $staff, updated_at = time::now();\n\
             {link_user}\n\
             COMMIT TRANSACTION;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("staff", to_json(ENTITY, &staff)?));
        if let Some(link) = link {
            builder = builder
                .bind(("link_user", link.user_id.to_string()))
                .bind(("link_department", link.department_id.map(|d| d.to_string())));
            if let Some(role) = link.role {
                builder = builder.bind(("link_role", role.as_str().to_string()));
            }
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> CivicResult<()> {
        let department = self.get_by_id(id).await?;
        if !department.is_active {
            return Err(DbError::not_found(ENTITY, id).into());
        }

        // Suffixing name and code frees both unique slots for reuse.
        self.db
            .query(
                "UPDATE type::record('department', $id) SET \
                 is_active = false, deleted_at = time::now(), \
                 name = string::concat(name, '#deleted_', $stamp), \
                 code = string::concat(code, '#', $stamp), \
                 head_id = NONE, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("stamp", Utc::now().timestamp().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        Ok(())
    }

    async fn list(
        &self,
        filter: DepartmentFilter,
        pagination: Pagination,
    ) -> CivicResult<PaginatedResult<Department>> {
        let mut conditions = vec!["is_active = true"];
        if filter.category.is_some() {
            conditions.push("$category IN categories");
        }
        if filter.pincode.is_some() {
            conditions.push("$pincode IN service_area");
        }
        if filter.search.is_some() {
            conditions.push(
                "(string::lowercase(name) CONTAINS $search \
                 OR string::lowercase(code) CONTAINS $search \
                 OR (description != NONE \
                 AND string::lowercase(description) CONTAINS $search))",
            );
        }
        if filter.within_area.is_some() {
            conditions.push("service_area CONTAINSANY $within_area");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM department WHERE {where_clause} GROUP ALL;\n\
             SELECT meta::id(id) AS record_id, * FROM department \
             WHERE {where_clause} ORDER BY name ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(category) = filter.category {
            builder = builder.bind(("category", category.as_str().to_string()));
        }
        if let Some(pincode) = filter.pincode {
            builder = builder.bind(("pincode", pincode.to_string()));
        }
        if let Some(search) = filter.search {
            builder = builder.bind(("search", search.to_lowercase()));
        }
        if let Some(area) = filter.within_area {
            builder = builder.bind(("within_area", area_strings(&area)));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<DepartmentRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(DepartmentRow::try_into_department)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
