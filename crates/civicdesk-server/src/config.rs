//! Server configuration, read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `5000` |
//! | `SURREAL_URL` | `ws://127.0.0.1:8000` |
//! | `SURREAL_NS` / `SURREAL_DB` | `civicdesk` / `main` |
//! | `SURREAL_USER` / `SURREAL_PASS` | `root` / `root` |
//! | `JWT_PRIVATE_KEY_FILE` / `JWT_PUBLIC_KEY_FILE` | required |
//! | `JWT_ISSUER` | `civicdesk` |
//! | `JWT_EXPIRE_SECS` | `604800` |
//! | `PASSWORD_PEPPER` | unset |
//! | `FRONTEND_URL` | `http://localhost:3000` |
//! | `TRANSITION_POLICY` | `permissive` |
//! | `CORS_ORIGINS` | comma separated, empty allows any origin |
//! | `TRUST_PROXY` | `false`; when true `X-Forwarded-For` names the client |

use std::env;
use std::str::FromStr;

use civicdesk_auth::AuthConfig;
use civicdesk_core::models::complaint::TransitionPolicy;
use civicdesk_db::DbConfig;
use civicdesk_workflow::LifecycleConfig;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("cannot read {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub lifecycle: LifecycleConfig,
    pub cors_origins: Vec<String>,
    pub trust_proxy: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_defaults = DbConfig::default();
        let db = DbConfig {
            url: var_or("SURREAL_URL", db_defaults.url),
            namespace: var_or("SURREAL_NS", db_defaults.namespace),
            database: var_or("SURREAL_DB", db_defaults.database),
            username: var_or("SURREAL_USER", db_defaults.username),
            password: var_or("SURREAL_PASS", db_defaults.password),
        };

        let auth_defaults = AuthConfig::default();
        let auth = AuthConfig {
            jwt_private_key_pem: read_key("JWT_PRIVATE_KEY_FILE")?,
            jwt_public_key_pem: read_key("JWT_PUBLIC_KEY_FILE")?,
            jwt_issuer: var_or("JWT_ISSUER", auth_defaults.jwt_issuer.clone()),
            access_token_lifetime_secs: parsed_or(
                "JWT_EXPIRE_SECS",
                auth_defaults.access_token_lifetime_secs,
            )?,
            pepper: env::var("PASSWORD_PEPPER").ok().filter(|p| !p.is_empty()),
            frontend_url: var_or("FRONTEND_URL", auth_defaults.frontend_url.clone()),
            ..auth_defaults
        };

        let lifecycle = LifecycleConfig {
            transition_policy: parsed_or("TRANSITION_POLICY", TransitionPolicy::default())?,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var_or("HOST", "0.0.0.0".to_string()),
            port: parsed_or("PORT", DEFAULT_PORT)?,
            db,
            auth,
            lifecycle,
            cors_origins,
            trust_proxy: parsed_or("TRUST_PROXY", false)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var_or(name: &str, default: String) -> String {
    env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw })
        }
        _ => Ok(default),
    }
}

fn read_key(name: &'static str) -> Result<String, ConfigError> {
    let path = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    std::fs::read_to_string(&path).map_err(|source| ConfigError::KeyFile { path, source })
}
