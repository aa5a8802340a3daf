//! Shared application state.

use std::sync::Arc;

use civicdesk_auth::{AuthConfig, IdentityService};
use civicdesk_core::notifier::LogNotifier;
use civicdesk_db::{
    SurrealComplaintRepository, SurrealDepartmentRepository, SurrealThrottleRepository,
    SurrealUserRepository,
};
use civicdesk_workflow::{
    ComplaintEngine, DepartmentRegistry, EmployeeService, JurisdictionService, LifecycleConfig,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

pub type Users = SurrealUserRepository<Any>;
pub type Departments = SurrealDepartmentRepository<Any>;
pub type Complaints = SurrealComplaintRepository<Any>;
pub type Throttle = SurrealThrottleRepository<Any>;

pub type Identity = IdentityService<Users, Throttle, LogNotifier>;
pub type Registry = DepartmentRegistry<Departments, Users, Complaints>;
pub type Employees = EmployeeService<Users, Departments>;
pub type Engine = ComplaintEngine<Complaints, Users, LogNotifier>;
pub type Jurisdiction = JurisdictionService<Users>;

/// Services handed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<Identity>,
    pub departments: Arc<Registry>,
    pub employees: Arc<Employees>,
    pub complaints: Arc<Engine>,
    pub jurisdiction: Arc<Jurisdiction>,
    /// Honour `X-Forwarded-For` when deriving client addresses.
    pub trust_proxy: bool,
}

impl AppState {
    pub fn new(db: Surreal<Any>, auth: AuthConfig, lifecycle: LifecycleConfig) -> Self {
        let users = match &auth.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };
        let departments = SurrealDepartmentRepository::new(db.clone());
        let complaints = SurrealComplaintRepository::new(db.clone());
        let throttle = SurrealThrottleRepository::new(db);
        let min_password_length = auth.min_password_length;

        Self {
            identity: Arc::new(IdentityService::new(
                users.clone(),
                throttle,
                LogNotifier,
                auth,
            )),
            departments: Arc::new(DepartmentRegistry::new(
                departments.clone(),
                users.clone(),
                complaints.clone(),
            )),
            employees: Arc::new(EmployeeService::new(
                users.clone(),
                departments,
                min_password_length,
            )),
            complaints: Arc::new(ComplaintEngine::new(
                complaints,
                users.clone(),
                LogNotifier,
                lifecycle,
            )),
            jurisdiction: Arc::new(JurisdictionService::new(users)),
            trust_proxy: false,
        }
    }

    pub fn with_trusted_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}
