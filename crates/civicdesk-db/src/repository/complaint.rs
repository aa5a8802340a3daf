//! SurrealDB implementation of [`ComplaintRepository`].
//!
//! `save` is a compare-and-swap on `revision`: the update only applies
//! while the stored revision equals the one the caller read.

use chrono::{DateTime, Utc};
use civicdesk_core::error::CivicResult;
use civicdesk_core::models::complaint::Complaint;
use civicdesk_core::pincode::AreaSet;
use civicdesk_core::repository::{ComplaintRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, area_strings, from_json, parse_optional_uuid, parse_uuid, to_json};
use crate::error::DbError;

const ENTITY: &str = "complaint";

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('complaint', $id)";

/// Fields rewritten by both `create` and `save`.
const CONTENT_SETS: &str = "\
    title = $title, description = $description, \
    category = $category, priority = $priority, \
    pin_code = $pin_code, location = $location, media = $media, \
    department_id = $department_id, assigned_to = $assigned_to, \
    assigned_at = $assigned_at, timeline = $timeline, \
    resolved_at = $resolved_at, support = $support, \
    feedback = $feedback, related_complaints = $related_complaints, \
    tags = $tags, updated_at = $updated_at";

#[derive(Debug, SurrealValue)]
struct ComplaintRow {
    record_id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    category: String,
    priority: String,
    location: serde_json::Value,
    media: serde_json::Value,
    department_id: Option<String>,
    assigned_to: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    timeline: serde_json::Value,
    resolved_at: Option<DateTime<Utc>>,
    support: serde_json::Value,
    feedback: serde_json::Value,
    related_complaints: Vec<String>,
    tags: Vec<String>,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Projection of an `UPDATE` result; a row means the swap applied.
#[derive(Debug, SurrealValue)]
struct RevisionRow {
    #[allow(dead_code)]
    revision: u64,
}

impl ComplaintRow {
    fn try_into_complaint(self) -> Result<Complaint, DbError> {
        let related_complaints = self
            .related_complaints
            .iter()
            .map(|id| parse_uuid(ENTITY, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Complaint {
            id: parse_uuid(ENTITY, &self.record_id)?,
            user_id: parse_uuid(ENTITY, &self.user_id)?,
            title: self.title,
            description: self.description,
            category: from_json(ENTITY, serde_json::Value::String(self.category))?,
            priority: from_json(ENTITY, serde_json::Value::String(self.priority))?,
            location: from_json(ENTITY, self.location)?,
            media: from_json(ENTITY, self.media)?,
            department_id: parse_optional_uuid(ENTITY, self.department_id)?,
            assigned_to: parse_optional_uuid(ENTITY, self.assigned_to)?,
            assigned_at: self.assigned_at,
            timeline: from_json(ENTITY, self.timeline)?,
            resolved_at: self.resolved_at,
            support: from_json(ENTITY, self.support)?,
            feedback: from_json(ENTITY, self.feedback)?,
            related_complaints,
            tags: self.tags,
            revision: self.revision,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn into_complaints(rows: Vec<ComplaintRow>) -> Result<Vec<Complaint>, DbError> {
    rows.into_iter().map(ComplaintRow::try_into_complaint).collect()
}

/// SurrealDB implementation of the Complaint repository.
#[derive(Clone)]
pub struct SurrealComplaintRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealComplaintRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Option<Complaint>, DbError> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<ComplaintRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(ComplaintRow::try_into_complaint)
            .transpose()
    }
}

/// Bind every `CONTENT_SETS` parameter on a query builder.
macro_rules! bind_content {
    ($query:expr, $complaint:expr) => {{
        let c: Complaint = $complaint;
        $query
            .bind(("title", c.title))
            .bind(("description", c.description))
            .bind(("category", c.category.as_str().to_string()))
            .bind(("priority", to_json(ENTITY, &c.priority)?))
            .bind(("pin_code", c.location.pin_code.to_string()))
            .bind(("location", to_json(ENTITY, &c.location)?))
            .bind(("media", to_json(ENTITY, &c.media)?))
            .bind(("department_id", c.department_id.map(|d| d.to_string())))
            .bind(("assigned_to", c.assigned_to.map(|a| a.to_string())))
            .bind(("assigned_at", c.assigned_at))
            .bind(("timeline", to_json(ENTITY, &c.timeline)?))
            .bind(("resolved_at", c.resolved_at))
            .bind(("support", to_json(ENTITY, &c.support)?))
            .bind(("feedback", to_json(ENTITY, &c.feedback)?))
            .bind((
                "related_complaints",
                c.related_complaints
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>(),
            ))
            .bind(("tags", c.tags))
            .bind(("updated_at", c.updated_at))
    }};
}

impl<C: Connection> ComplaintRepository for SurrealComplaintRepository<C> {
    async fn create(&self, complaint: Complaint) -> CivicResult<Complaint> {
        let id_str = complaint.id.to_string();
        let query = format!(
            "CREATE type::record('complaint', $id) SET {CONTENT_SETS}, \
             user_id = $user_id, revision = $revision, \
             created_at = $created_at;\n{SELECT_BY_ID};"
        );

        let builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", complaint.user_id.to_string()))
            .bind(("revision", complaint.revision))
            .bind(("created_at", complaint.created_at));
        let mut result = bind_content!(builder, complaint)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<ComplaintRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id_str))?;
        Ok(row.try_into_complaint()?)
    }

    async fn get_by_id(&self, id: Uuid) -> CivicResult<Complaint> {
        let id_str = id.to_string();
        self.fetch(&id_str)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id_str).into())
    }

    async fn save(&self, complaint: Complaint) -> CivicResult<Complaint> {
        let id_str = complaint.id.to_string();
        let expected = complaint.revision;

        let query = format!(
            "UPDATE type::record('complaint', $id) SET {CONTENT_SETS}, \
             revision = revision + 1 WHERE revision = $expected;"
        );
        let builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected));
        let mut result = bind_content!(builder, complaint)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let updated: Vec<RevisionRow> = result.take(0).map_err(DbError::from)?;
        let stored = self.fetch(&id_str).await?;

        match (updated.first(), stored) {
            (Some(_), Some(complaint)) => Ok(complaint),
            (None, Some(_)) => Err(DbError::Conflict {
                entity: ENTITY.into(),
                id: id_str,
            }
            .into()),
            (_, None) => Err(DbError::not_found(ENTITY, id_str).into()),
        }
    }

    async fn list_by_pincodes(&self, area: &AreaSet) -> CivicResult<Vec<Complaint>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM complaint \
                 WHERE pin_code IN $area ORDER BY created_at DESC",
            )
            .bind(("area", area_strings(area)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplaintRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_complaints(rows)?)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> CivicResult<PaginatedResult<Complaint>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM complaint \
                 WHERE user_id = $user_id GROUP ALL;\n\
                 SELECT meta::id(id) AS record_id, * FROM complaint \
                 WHERE user_id = $user_id ORDER BY created_at DESC \
                 LIMIT $limit START $offset;",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<ComplaintRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: into_complaints(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_department(&self, department_id: Uuid) -> CivicResult<Vec<Complaint>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM complaint \
                 WHERE department_id = $department_id ORDER BY created_at DESC",
            )
            .bind(("department_id", department_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplaintRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_complaints(rows)?)
    }
}
