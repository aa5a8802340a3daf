//! SurrealDB implementation of [`ThrottleRepository`].
//!
//! One record per key; the upsert both counts the hit and rolls the
//! window over in a single statement, so concurrent instances sharing
//! the database never lose a hit.

use chrono::{DateTime, Duration, Utc};
use civicdesk_core::error::CivicResult;
use civicdesk_core::repository::ThrottleRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

/// Windows are capped at a year.
const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, SurrealValue)]
struct ThrottleRow {
    hits: u32,
}

#[derive(Clone)]
pub struct SurrealThrottleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealThrottleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ThrottleRepository for SurrealThrottleRepository<C> {
    async fn hit(&self, key: &str, window_secs: u64, now: DateTime<Utc>) -> CivicResult<u32> {
        let window = Duration::seconds(window_secs.min(MAX_WINDOW_SECS) as i64);
        let window_ends_at = now + window;

        let mut result = self
            .db
            .query(
                "UPSERT type::record('login_throttle', $key) SET \
                 hits = IF window_ends_at != NONE AND window_ends_at > $now \
                     THEN hits + 1 ELSE 1 END, \
                 window_ends_at = IF window_ends_at != NONE \
                     AND window_ends_at > $now \
                     THEN window_ends_at ELSE $window_ends_at END",
            )
            .bind(("key", key.to_string()))
            .bind(("now", now))
            .bind(("window_ends_at", window_ends_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<ThrottleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.hits).unwrap_or(1))
    }

    async fn reset(&self, key: &str) -> CivicResult<()> {
        self.db
            .query("DELETE type::record('login_throttle', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }
}
