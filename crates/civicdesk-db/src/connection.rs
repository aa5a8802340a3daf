//! SurrealDB connection management.
//!
//! Endpoints are resolved through `surrealdb::engine::any`, so the same
//! binary runs against a remote server (`ws://`, `wss://`) or an
//! embedded in-memory store (`mem://`).

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; ignored for embedded endpoints.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "civicdesk".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// An embedded, non-persistent store.
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".into(),
            ..Self::default()
        }
    }

    fn is_embedded(&self) -> bool {
        self.url.starts_with("mem://")
    }
}

/// Owns the SurrealDB handle shared by every repository.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Connect, authenticate when remote, select the namespace and
    /// database, and bring the schema up to date.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.url.as_str()).await?;

        if !config.is_embedded() {
            db.signin(Root {
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;

        info!("SurrealDB ready");
        Ok(Self { db })
    }

    /// Returns the underlying client; clones share one connection.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
