//! Authentication configuration.

/// Configuration for the identity service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 7 days).
    pub access_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    pub min_password_length: usize,
    /// Consecutive failed logins before the account locks (default: 5).
    pub max_failed_login_attempts: u32,
    /// Lock duration in seconds (default: 1800 = 30 minutes).
    pub lockout_duration_secs: u64,
    /// E-mail verification token lifetime in seconds (default: 24 hours).
    pub verification_token_lifetime_secs: u64,
    /// Login throttle window in seconds, per client key.
    pub throttle_window_secs: u64,
    /// Login attempts allowed per client key inside one window.
    pub throttle_max_attempts: u32,
    /// Base URL of the citizen front end; verification links point here.
    pub frontend_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "civicdesk".into(),
            access_token_lifetime_secs: 7 * 24 * 3600,
            pepper: None,
            min_password_length: 6,
            max_failed_login_attempts: 5,
            lockout_duration_secs: 1800,
            verification_token_lifetime_secs: 24 * 3600,
            throttle_window_secs: 900,
            throttle_max_attempts: 20,
            frontend_url: "http://localhost:3000".into(),
        }
    }
}
