//! CivicDesk Database — SurrealDB connection management, schema
//! migrations and repository implementations of the `civicdesk-core`
//! traits.

mod connection;
mod error;
mod password;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use password::hash_password;
pub use repository::{
    SurrealComplaintRepository, SurrealDepartmentRepository, SurrealThrottleRepository,
    SurrealUserRepository,
};
pub use schema::{latest_version, run_migrations};
