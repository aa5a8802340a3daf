//! Database-specific error types and conversions.

use civicdesk_core::error::CivicError;

/// Unique indexes whose violation is reported as a duplicate rather than
/// a database failure.
const UNIQUE_INDEXES: &[&str] = &[
    "idx_user_email",
    "idx_user_phone",
    "idx_user_employee_id",
    "idx_department_name",
    "idx_department_code",
    "idx_department_head",
];

/// Message thrown inside a transaction when a department's head slot is
/// already taken.
pub(crate) const HEAD_SLOT_TAKEN: &str = "department_head_slot_taken";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unique index {index} already contains this value")]
    UniqueViolation { index: &'static str },

    #[error("Malformed {entity} record: {message}")]
    Corrupt {
        entity: &'static str,
        message: String,
    },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Stale revision for {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Department already has a head")]
    HeadSlotTaken,
}

impl DbError {
    /// Classify the error of a failed statement.
    pub fn from_statement(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains(HEAD_SLOT_TAKEN) {
            return DbError::HeadSlotTaken;
        }
        if message.contains("already contains") {
            if let Some(index) = UNIQUE_INDEXES.iter().find(|i| message.contains(*i)) {
                return DbError::UniqueViolation { index };
            }
        }
        DbError::Query(message)
    }

    pub fn corrupt(entity: &'static str, message: impl ToString) -> Self {
        DbError::Corrupt {
            entity,
            message: message.to_string(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for CivicError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CivicError::NotFound { entity, id },
            DbError::Conflict { entity, id } => CivicError::Conflict { entity, id },
            DbError::UniqueViolation { index } => {
                let field = match index {
                    "idx_user_email" => "email",
                    "idx_user_phone" => "phone",
                    "idx_user_employee_id" => "employee_id",
                    "idx_department_name" => "name",
                    "idx_department_head" => "head_id",
                    _ => "code",
                };
                CivicError::DuplicateEntry { field: field.into() }
            }
            DbError::HeadSlotTaken => CivicError::DuplicateEntry {
                field: "department_head".into(),
            },
            other => CivicError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_become_duplicates() {
        let err: CivicError = DbError::UniqueViolation {
            index: "idx_user_phone",
        }
        .into();
        assert_eq!(err.code(), "PHONE_EXISTS");
    }

    #[test]
    fn employee_id_index_maps_to_its_field() {
        let err: CivicError = DbError::UniqueViolation {
            index: "idx_user_employee_id",
        }
        .into();
        assert_eq!(err.code(), "EMPLOYEE_ID_EXISTS");
    }

    #[test]
    fn conflicts_survive_translation() {
        let err: CivicError = DbError::Conflict {
            entity: "complaint".into(),
            id: "x".into(),
        }
        .into();
        assert!(matches!(err, CivicError::Conflict { .. }));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn other_failures_are_internal() {
        let err: CivicError = DbError::Query("boom".into()).into();
        assert!(err.is_internal());
    }
}
