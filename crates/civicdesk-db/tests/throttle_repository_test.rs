//! Integration tests for the shared login throttle.

use chrono::{Duration, Utc};
use civicdesk_core::repository::ThrottleRepository;
use civicdesk_db::repository::SurrealThrottleRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> SurrealThrottleRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    civicdesk_db::run_migrations(&db).await.unwrap();
    SurrealThrottleRepository::new(db)
}

#[tokio::test]
async fn hits_accumulate_inside_the_window() {
    let repo = setup().await;
    let now = Utc::now();
    assert_eq!(repo.hit("login:a", 60, now).await.unwrap(), 1);
    assert_eq!(repo.hit("login:a", 60, now).await.unwrap(), 2);
    assert_eq!(repo.hit("login:a", 60, now).await.unwrap(), 3);
    assert_eq!(repo.hit("login:b", 60, now).await.unwrap(), 1);
}

#[tokio::test]
async fn window_rolls_over_after_expiry() {
    let repo = setup().await;
    let now = Utc::now();
    repo.hit("login:a", 60, now).await.unwrap();
    repo.hit("login:a", 60, now).await.unwrap();

    let later = now + Duration::seconds(61);
    assert_eq!(repo.hit("login:a", 60, later).await.unwrap(), 1);
}

#[tokio::test]
async fn reset_clears_the_counter() {
    let repo = setup().await;
    let now = Utc::now();
    repo.hit("login:a", 60, now).await.unwrap();
    repo.reset("login:a").await.unwrap();
    assert_eq!(repo.hit("login:a", 60, now).await.unwrap(), 1);
}
