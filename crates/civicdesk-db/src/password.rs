//! Argon2id password hashing for stored credentials.
//!
//! Parameters follow the OWASP recommendation (19 MiB, 2 iterations,
//! parallelism 1) with a random salt per hash. An optional server-side
//! pepper is prepended to the password. Verification lives in the auth
//! layer and must apply the same pepper.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};

use crate::error::DbError;

/// Hash a password into a PHC string.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Query(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let input = match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| DbError::Query(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use argon2::{PasswordHash, PasswordVerifier};

    use super::*;

    fn matches(input: &str, hash: &str) -> bool {
        let parsed = PasswordHash::new(hash).unwrap();
        Argon2::default()
            .verify_password(input.as_bytes(), &parsed)
            .is_ok()
    }

    #[test]
    fn hashes_are_salted_argon2id() {
        let a = hash_password("hunter22", None).unwrap();
        let b = hash_password("hunter22", None).unwrap();
        assert!(a.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert_ne!(a, b);
        assert!(matches("hunter22", &a));
    }

    #[test]
    fn pepper_is_prepended() {
        let hash = hash_password("hunter22", Some("pepper")).unwrap();
        assert!(matches("pepperhunter22", &hash));
        assert!(!matches("hunter22", &hash));
    }
}
