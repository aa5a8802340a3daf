//! CivicDesk Core — domain models, the error taxonomy, the access
//! control evaluator, and the repository and collaborator traits shared
//! by every other crate.

pub mod access;
pub mod credential;
pub mod error;
pub mod models;
pub mod notifier;
pub mod pincode;
pub mod repository;

pub use error::{CivicError, CivicResult};
