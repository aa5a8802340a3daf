//! Integration tests for the User repository using in-memory SurrealDB.

use civicdesk_core::error::CivicError;
use civicdesk_core::models::address::Address;
use civicdesk_core::models::department::CreateDepartment;
use civicdesk_core::models::user::{CreateUser, Role, UpdateUser, UserFilter};
use civicdesk_core::pincode::{AreaSet, Pincode, parse_area};
use civicdesk_core::repository::{
    DepartmentEnrollment, DepartmentRepository, Pagination, UserRepository,
};
use civicdesk_db::repository::{SurrealDepartmentRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

fn password_matches(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let parsed = PasswordHash::new(hash).unwrap();
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    civicdesk_db::run_migrations(&db).await.unwrap();
    db
}

fn citizen(email: &str, phone: &str) -> CreateUser {
    CreateUser::citizen("Asha", "Rao", email, phone, "secret123")
}

fn employee(email: &str, phone: &str, role: Role, employee_id: &str) -> CreateUser {
    CreateUser {
        role,
        employee_id: Some(employee_id.into()),
        ..citizen(email, phone)
    }
}

fn address(pincode: &str) -> Address {
    Address {
        street: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: Pincode::parse(pincode).unwrap(),
        coordinates: None,
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = SurrealUserRepository::new(setup().await);

    let user = repo
        .create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();

    assert_eq!(user.role, Role::Citizen);
    assert!(user.is_active);
    assert!(!user.is_verified);
    assert_eq!(user.login_attempts, 0);
    assert!(user.password_hash.starts_with("$argon2id$"));
    assert!(password_matches("secret123", &user.password_hash));

    let fetched = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched.email, "asha@example.in");
    assert_eq!(fetched.notification_preferences, Default::default());

    let by_phone = repo.get_by_phone("9876543210").await.unwrap();
    assert_eq!(by_phone.id, user.id);
}

#[tokio::test]
async fn duplicate_email_is_reported_as_duplicate() {
    let repo = SurrealUserRepository::new(setup().await);
    repo.create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();

    let err = repo
        .create(citizen("asha@example.in", "9876543211"))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::DuplicateEntry { ref field } if field == "email"));

    let err = repo
        .create(citizen("other@example.in", "9876543210"))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::DuplicateEntry { ref field } if field == "phone"));
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let repo = SurrealUserRepository::new(setup().await);
    let err = repo.get_by_id(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CivicError::NotFound { .. }));
    let err = repo.get_by_email("nobody@example.in").await.unwrap_err();
    assert!(matches!(err, CivicError::NotFound { .. }));
}

#[tokio::test]
async fn update_rewrites_only_given_fields() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo
        .create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();

    let until = chrono::Utc::now() + chrono::Duration::minutes(30);
    let updated = repo
        .update(
            user.id,
            UpdateUser {
                first_name: Some("Asha K".into()),
                login_attempts: Some(5),
                lock_until: Some(Some(until)),
                address: Some(address("560001")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.first_name, "Asha K");
    assert_eq!(updated.last_name, "Rao");
    assert_eq!(updated.login_attempts, 5);
    assert!(updated.is_locked(chrono::Utc::now()));
    assert_eq!(updated.address_pincode().map(Pincode::as_str), Some("560001"));

    let cleared = repo
        .update(
            user.id,
            UpdateUser {
                lock_until: Some(None),
                login_attempts: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.lock_until.is_none());
    assert_eq!(cleared.first_name, "Asha K");
}

#[tokio::test]
async fn password_update_is_hashed() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo
        .create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();

    let updated = repo
        .update(
            user.id,
            UpdateUser {
                password: Some("newsecret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(password_matches("newsecret", &updated.password_hash));
    assert!(!password_matches("secret123", &updated.password_hash));
}

#[tokio::test]
async fn deactivate_releases_the_email() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo
        .create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();

    let gone = repo.deactivate(user.id).await.unwrap();
    assert!(!gone.is_active);
    assert!(gone.email.starts_with("deleted_"));
    assert!(gone.email.ends_with("_asha@example.in"));

    // Deactivating twice keeps the first mangled address.
    let again = repo.deactivate(user.id).await.unwrap();
    assert_eq!(again.email, gone.email);

    // The address is free again.
    repo.create(citizen("asha@example.in", "9876543211"))
        .await
        .unwrap();
}

#[tokio::test]
async fn list_filters_by_role_and_address() {
    let repo = SurrealUserRepository::new(setup().await);
    let mut staff = employee("s1@example.in", "9000000001", Role::Staff, "EMP1");
    staff.address = Some(address("560001"));
    repo.create(staff).await.unwrap();
    let mut far = employee("s2@example.in", "9000000002", Role::Staff, "EMP2");
    far.address = Some(address("110001"));
    repo.create(far).await.unwrap();
    repo.create(citizen("c@example.in", "9000000003"))
        .await
        .unwrap();

    let page = repo
        .list(
            UserFilter {
                roles: Some(vec![Role::Staff]),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let local = repo
        .list(
            UserFilter {
                roles: Some(vec![Role::Staff]),
                address_pincodes: Some(parse_area("area", ["560001"]).unwrap()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(local.total, 1);
    assert_eq!(local.items[0].email, "s1@example.in");

    let empty = repo
        .list(
            UserFilter {
                address_pincodes: Some(AreaSet::new()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn create_enrolled_links_both_documents() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let departments = SurrealDepartmentRepository::new(db);

    let dept = departments
        .create(CreateDepartment {
            name: "Water Works".into(),
            code: "WW".into(),
            description: None,
            categories: [civicdesk_core::models::complaint::Category::WaterSupply].into(),
            service_area: parse_area("serviceArea", ["560001"]).unwrap(),
            head_id: None,
            offices: vec![],
        })
        .await
        .unwrap();

    let mut input = employee("head@example.in", "9000000010", Role::DepartmentHead, "EMP10");
    input.department_id = Some(dept.id);
    let head = users
        .create_enrolled(
            input,
            DepartmentEnrollment {
                department_id: dept.id,
                staff_role: "head".into(),
                as_head: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(head.department_id, Some(dept.id));
    let dept = departments.get_by_id(dept.id).await.unwrap();
    assert_eq!(dept.head_id, Some(head.id));
    assert_eq!(dept.staff.len(), 1);
    assert_eq!(dept.staff[0].user_id, head.id);
    assert!(dept.staff[0].is_active);

    let by_employee_id = users.get_by_employee_id("EMP10").await.unwrap();
    assert_eq!(by_employee_id.id, head.id);
}

#[tokio::test]
async fn employee_id_is_unique_but_optional() {
    let repo = SurrealUserRepository::new(setup().await);
    repo.create(citizen("one@example.in", "9000000021"))
        .await
        .unwrap();
    repo.create(citizen("two@example.in", "9000000022"))
        .await
        .unwrap();

    repo.create(employee("a@example.in", "9000000023", Role::Staff, "EMP-7"))
        .await
        .unwrap();
    let err = repo
        .create(employee("b@example.in", "9000000024", Role::Staff, "EMP-7"))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::DuplicateEntry { ref field } if field == "employee_id"));
    assert_eq!(err.code(), "EMPLOYEE_ID_EXISTS");
}

#[tokio::test]
async fn a_taken_head_slot_rolls_back_the_enrollment() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let departments = SurrealDepartmentRepository::new(db);
    let dept = departments
        .create(CreateDepartment {
            name: "Parks".into(),
            code: "PK".into(),
            description: None,
            categories: [civicdesk_core::models::complaint::Category::Other].into(),
            service_area: parse_area("serviceArea", ["560001"]).unwrap(),
            head_id: None,
            offices: vec![],
        })
        .await
        .unwrap();
    let enroll_head = || DepartmentEnrollment {
        department_id: dept.id,
        staff_role: "head".into(),
        as_head: true,
    };

    let mut first = employee("h1@example.in", "9000000031", Role::DepartmentHead, "EMP31");
    first.department_id = Some(dept.id);
    let first = users.create_enrolled(first, enroll_head()).await.unwrap();

    let mut second = employee("h2@example.in", "9000000032", Role::DepartmentHead, "EMP32");
    second.department_id = Some(dept.id);
    let err = users
        .create_enrolled(second, enroll_head())
        .await
        .unwrap_err();
    assert!(
        matches!(err, CivicError::DuplicateEntry { ref field } if field == "department_head"),
        "{err:?}"
    );

    assert!(matches!(
        users.get_by_email("h2@example.in").await,
        Err(CivicError::NotFound { .. })
    ));
    let dept = departments.get_by_id(dept.id).await.unwrap();
    assert_eq!(dept.head_id, Some(first.id));
    assert_eq!(dept.staff.len(), 1);
}

#[tokio::test]
async fn failed_logins_lock_at_the_threshold_and_restart_after_expiry() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo
        .create(citizen("asha@example.in", "9876543210"))
        .await
        .unwrap();
    let now = chrono::Utc::now();
    let until = now + chrono::Duration::minutes(30);

    for expected in 1..=2 {
        let stored = repo.record_failed_login(user.id, 3, now, until).await.unwrap();
        assert_eq!(stored.login_attempts, expected);
        assert!(stored.lock_until.is_none());
    }
    let stored = repo.record_failed_login(user.id, 3, now, until).await.unwrap();
    assert_eq!(stored.login_attempts, 3);
    assert!(stored.lock_until.is_some());

    let later = until + chrono::Duration::minutes(1);
    let stored = repo
        .record_failed_login(user.id, 3, later, later + chrono::Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(stored.login_attempts, 1);
    assert!(stored.lock_until.is_none());
}
