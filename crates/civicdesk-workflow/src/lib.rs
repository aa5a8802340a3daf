//! CivicDesk Workflow — the services that mutate departments, employees
//! and complaints. Every operation takes the acting user, consults the
//! access evaluator before touching storage, and notifies best-effort
//! after the write.

pub mod complaint;
pub mod config;
pub mod department;
pub mod employee;
pub mod jurisdiction;
mod patch;

pub use complaint::ComplaintEngine;
pub use config::LifecycleConfig;
pub use department::DepartmentRegistry;
pub use employee::EmployeeService;
pub use jurisdiction::JurisdictionService;
pub use patch::double_option;
