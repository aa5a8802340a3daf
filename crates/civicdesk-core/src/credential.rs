//! Credential verification seam.

use uuid::Uuid;

use crate::error::CivicResult;

/// Turns a raw bearer credential into the id of the user it was issued
/// to. Implementations fail with `CivicError::Unauthenticated`.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, raw: &str) -> CivicResult<Uuid>;
}
