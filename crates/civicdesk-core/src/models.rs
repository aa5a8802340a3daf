//! Domain models for CivicDesk.
//!
//! These are the core types shared across all crates.

pub mod address;
pub mod complaint;
pub mod department;
pub mod user;
