//! Shared fixtures for the workflow integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use civicdesk_core::access::Actor;
use civicdesk_core::models::address::Address;
use civicdesk_core::models::complaint::{Category, Complaint, FileComplaint};
use civicdesk_core::models::user::{CreateUser, Role, User};
use civicdesk_core::notifier::MemoryNotifier;
use civicdesk_core::pincode::{Pincode, parse_area};
use civicdesk_core::repository::{ComplaintRepository, UserRepository};
use civicdesk_db::repository::{
    SurrealComplaintRepository, SurrealDepartmentRepository, SurrealUserRepository,
};
use civicdesk_workflow::department::NewDepartment;
use civicdesk_workflow::{
    ComplaintEngine, DepartmentRegistry, EmployeeService, JurisdictionService, LifecycleConfig,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub type Users = SurrealUserRepository<Db>;
pub type Departments = SurrealDepartmentRepository<Db>;
pub type Complaints = SurrealComplaintRepository<Db>;

pub struct Harness {
    pub users: Users,
    pub departments: Departments,
    pub complaints: Complaints,
    pub notifier: MemoryNotifier,
    pub registry: DepartmentRegistry<Departments, Users, Complaints>,
    pub employees: EmployeeService<Users, Departments>,
    pub engine: ComplaintEngine<Complaints, Users, MemoryNotifier>,
    pub jurisdiction: JurisdictionService<Users>,
}

pub async fn setup() -> Harness {
    setup_with(LifecycleConfig::default()).await
}

pub async fn setup_with(config: LifecycleConfig) -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    civicdesk_db::run_migrations(&db).await.unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let departments = SurrealDepartmentRepository::new(db.clone());
    let complaints = SurrealComplaintRepository::new(db);
    let notifier = MemoryNotifier::default();

    Harness {
        registry: DepartmentRegistry::new(departments.clone(), users.clone(), complaints.clone()),
        employees: EmployeeService::new(users.clone(), departments.clone(), 6),
        engine: ComplaintEngine::new(
            complaints.clone(),
            users.clone(),
            notifier.clone(),
            config,
        ),
        jurisdiction: JurisdictionService::new(users.clone()),
        users,
        departments,
        complaints,
        notifier,
    }
}

static SEQ: AtomicU32 = AtomicU32::new(1);

pub fn pin(code: &str) -> Pincode {
    Pincode::parse(code).unwrap()
}

/// Insert a user directly, bypassing every service check.
pub async fn seed_user(users: &Users, role: Role, name: &str) -> User {
    seed_user_with(users, role, name, None, &[], None).await
}

pub async fn seed_user_with(
    users: &Users,
    role: Role,
    name: &str,
    department_id: Option<Uuid>,
    admin_area: &[&str],
    address_pincode: Option<&str>,
) -> User {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    let email = format!("{}{n}@example.in", name.to_lowercase());
    let phone = format!("9{n:09}");
    users
        .create(CreateUser {
            role,
            department_id,
            employee_id: role.is_employee().then(|| format!("EMP{n:04}")),
            admin_area: parse_area("adminArea", admin_area.iter().copied()).unwrap(),
            address: address_pincode.map(|p| Address {
                street: None,
                city: "Bengaluru".into(),
                state: "Karnataka".into(),
                pincode: pin(p),
                coordinates: None,
            }),
            is_verified: true,
            ..CreateUser::citizen(name, "Tester", email, phone, "secret123")
        })
        .await
        .unwrap()
}

pub fn actor(user: &User) -> Actor {
    Actor::from(user)
}

pub fn new_department(name: &str, code: &str, area: &[&str]) -> NewDepartment {
    NewDepartment {
        name: name.into(),
        code: code.into(),
        description: None,
        categories: vec!["Road".into()],
        service_area: area.iter().map(|p| p.to_string()).collect(),
        head_id: None,
        offices: Vec::new(),
    }
}

pub fn file_input(pin_code: &str) -> FileComplaint {
    FileComplaint {
        title: "Broken streetlight".into(),
        description: Some("The lamp at the corner has been out for a week".into()),
        category: Category::Streetlight,
        priority: None,
        longitude: 77.59,
        latitude: 12.97,
        state: "Karnataka".into(),
        district: "Bengaluru Urban".into(),
        locality: "Jayanagar".into(),
        pin_code: pin_code.into(),
        address: None,
        landmark: None,
        media: Default::default(),
        department_id: None,
        related_complaints: Vec::new(),
        tags: Vec::new(),
    }
}

/// File a complaint straight into storage on behalf of `user_id`.
pub async fn seed_complaint(
    complaints: &Complaints,
    user_id: Uuid,
    pin_code: &str,
    department_id: Option<Uuid>,
) -> Complaint {
    let mut input = file_input(pin_code);
    input.department_id = department_id;
    complaints
        .create(input.into_complaint(user_id, Utc::now()).unwrap())
        .await
        .unwrap()
}
