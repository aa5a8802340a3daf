//! CivicDesk Auth — password verification, JWT issuance/validation,
//! e-mail verification tokens and the identity service (registration,
//! login with lockout and throttling, account self-service).

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{
    AccountUpdate, IdentityService, LoginInput, LoginOutput, ProfileUpdate, RegisterInput,
};
pub use token::{AccessTokenClaims, JwtVerifier};
