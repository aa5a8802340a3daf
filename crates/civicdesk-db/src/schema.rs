//! Schema definitions and migration runner for SurrealDB.
//!
//! UUIDs are stored as strings and enums as strings guarded by ASSERT
//! constraints. Tables that hold nested documents (addresses, rosters,
//! timelines) are SCHEMALESS with their scalar and indexed fields
//! defined; the bookkeeping tables are SCHEMAFULL.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "login_throttle",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "tighten_constraints",
        sql: SCHEMA_V3,
    },
];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users (citizens and employees)
-- =======================================================================
DEFINE TABLE user SCHEMALESS;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD phone ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['citizen', 'staff', 'department_head', \
    'municipal_admin', 'admin'];
DEFINE FIELD department_id ON TABLE user TYPE option<string>;
DEFINE FIELD employee_id ON TABLE user TYPE option<string>;
DEFINE FIELD admin_area ON TABLE user TYPE array<string> DEFAULT [];
DEFINE FIELD service_area ON TABLE user TYPE array<string> DEFAULT [];
DEFINE FIELD address_pincode ON TABLE user TYPE option<string>;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_verified ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD verification_token_hash ON TABLE user TYPE option<string>;
DEFINE FIELD verification_expires_at ON TABLE user \
    TYPE option<datetime>;
DEFINE FIELD last_login ON TABLE user TYPE option<datetime>;
DEFINE FIELD login_attempts ON TABLE user TYPE int DEFAULT 0;
DEFINE FIELD lock_until ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_phone ON TABLE user COLUMNS phone UNIQUE;
DEFINE INDEX idx_user_employee_id ON TABLE user COLUMNS employee_id;
DEFINE INDEX idx_user_department ON TABLE user COLUMNS department_id;
DEFINE INDEX idx_user_verification ON TABLE user \
    COLUMNS verification_token_hash;

-- =======================================================================
-- Departments
-- =======================================================================
DEFINE TABLE department SCHEMALESS;
DEFINE FIELD name ON TABLE department TYPE string;
DEFINE FIELD code ON TABLE department TYPE string;
DEFINE FIELD description ON TABLE department TYPE option<string>;
DEFINE FIELD categories ON TABLE department TYPE array<string> DEFAULT [];
DEFINE FIELD service_area ON TABLE department TYPE array<string> \
    DEFAULT [];
DEFINE FIELD head_id ON TABLE department TYPE option<string>;
DEFINE FIELD staff ON TABLE department TYPE array DEFAULT [];
DEFINE FIELD offices ON TABLE department TYPE array DEFAULT [];
DEFINE FIELD is_active ON TABLE department TYPE bool DEFAULT true;
DEFINE FIELD deleted_at ON TABLE department TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE department TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE department TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_department_name ON TABLE department COLUMNS name UNIQUE;
DEFINE INDEX idx_department_code ON TABLE department COLUMNS code UNIQUE;
DEFINE INDEX idx_department_head ON TABLE department COLUMNS head_id;

-- =======================================================================
-- Complaints
-- =======================================================================
DEFINE TABLE complaint SCHEMALESS;
DEFINE FIELD user_id ON TABLE complaint TYPE string;
DEFINE FIELD title ON TABLE complaint TYPE string;
DEFINE FIELD description ON TABLE complaint TYPE string;
DEFINE FIELD category ON TABLE complaint TYPE string \
    ASSERT $value IN ['Road', 'Sanitation', 'Streetlight', \
    'Water Supply', 'Medical', 'Food Safety', 'Other'];
DEFINE FIELD priority ON TABLE complaint TYPE string \
    ASSERT $value IN ['Low', 'Medium', 'High', 'Critical'];
DEFINE FIELD pin_code ON TABLE complaint TYPE string;
DEFINE FIELD location ON TABLE complaint TYPE object;
DEFINE FIELD department_id ON TABLE complaint TYPE option<string>;
DEFINE FIELD assigned_to ON TABLE complaint TYPE option<string>;
DEFINE FIELD assigned_at ON TABLE complaint TYPE option<datetime>;
DEFINE FIELD timeline ON TABLE complaint TYPE array;
DEFINE FIELD resolved_at ON TABLE complaint TYPE option<datetime>;
DEFINE FIELD revision ON TABLE complaint TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE complaint TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE complaint TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_complaint_pin_code ON TABLE complaint COLUMNS pin_code;
DEFINE INDEX idx_complaint_user ON TABLE complaint COLUMNS user_id;
DEFINE INDEX idx_complaint_department ON TABLE complaint \
    COLUMNS department_id;
DEFINE INDEX idx_complaint_assignee ON TABLE complaint \
    COLUMNS assigned_to;
";

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Login throttle counters (shared across server instances)
-- =======================================================================
DEFINE TABLE login_throttle SCHEMAFULL;
DEFINE FIELD hits ON TABLE login_throttle TYPE int;
DEFINE FIELD window_ends_at ON TABLE login_throttle TYPE datetime;
";

// Unique indexes skip NONE, so citizens without an employee id and
// departments without a head never collide. Complaint descriptions
// become optional.
const SCHEMA_V3: &str = "\
REMOVE INDEX IF EXISTS idx_user_employee_id ON TABLE user;
DEFINE INDEX idx_user_employee_id ON TABLE user COLUMNS employee_id UNIQUE;
REMOVE INDEX IF EXISTS idx_department_head ON TABLE department;
DEFINE INDEX idx_department_head ON TABLE department COLUMNS head_id UNIQUE;
REMOVE FIELD IF EXISTS description ON TABLE complaint;
DEFINE FIELD description ON TABLE complaint TYPE option<string>;
";

/// Apply every migration newer than the recorded schema version.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}': {}",
                migration.version, migration.name, e
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e
                ))
            })?;
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
