//! Identity service — registration, login with lockout and throttling,
//! e-mail verification, account self-service and account administration.

use chrono::{DateTime, Duration, Utc};
use civicdesk_core::access::{Action, Actor, authorize};
use civicdesk_core::credential::CredentialVerifier;
use civicdesk_core::error::{CivicError, CivicResult};
use civicdesk_core::models::address::Address;
use civicdesk_core::models::user::{
    CreateUser, NotificationPreferences, Role, UpdateUser, User, UserFilter, validate_email,
    validate_phone,
};
use civicdesk_core::notifier::{Notification, Notifier, dispatch};
use civicdesk_core::pincode::AreaSet;
use civicdesk_core::repository::{PaginatedResult, Pagination, ThrottleRepository, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, JwtVerifier};

pub const VERIFY_EMAIL_SUBJECT: &str = "Verify Your Email";
pub const WELCOME_SUBJECT: &str = "Welcome!";

/// Public self-registration. Always creates a citizen.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// Throttle key of the caller (usually the client IP). Falls back
    /// to the e-mail address.
    pub client_key: Option<String>,
}

/// A signed access token and the account it was issued for.
#[derive(Debug, Clone)]
pub struct LoginOutput {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: User,
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub notification_preferences: Option<NotificationPreferences>,
}

/// Fields an admin may change on any account.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<Option<Uuid>>,
    pub admin_area: Option<AreaSet>,
    pub address: Option<Address>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

/// Identity service.
///
/// Generic over repository and notifier implementations so that the
/// auth layer has no dependency on the database crate.
pub struct IdentityService<U: UserRepository, T: ThrottleRepository, N: Notifier> {
    users: U,
    throttle: T,
    notifier: N,
    verifier: JwtVerifier,
    config: AuthConfig,
}

impl<U: UserRepository, T: ThrottleRepository, N: Notifier> IdentityService<U, T, N> {
    pub fn new(users: U, throttle: T, notifier: N, config: AuthConfig) -> Self {
        Self {
            users,
            throttle,
            notifier,
            verifier: JwtVerifier::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Register a citizen and send the verification e-mail.
    pub async fn register(&self, input: RegisterInput) -> CivicResult<LoginOutput> {
        let first_name = required_name("firstName", &input.first_name)?;
        let last_name = required_name("lastName", &input.last_name)?;
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        let phone = input.phone.trim().to_string();
        validate_phone(&phone)?;
        password::check_policy(&input.password, &self.config)?;

        self.ensure_unused("email", self.users.get_by_email(&email).await)?;
        self.ensure_unused("phone", self.users.get_by_phone(&phone).await)?;

        let raw_token = token::generate_opaque_token();
        let mut create = CreateUser::citizen(first_name, last_name, email, phone, input.password);
        create.address = input.address;
        create.verification_token_hash = Some(token::hash_opaque_token(&raw_token));
        create.verification_expires_at = Some(self.verification_deadline(Utc::now()));

        let user = self.users.create(create).await?;
        info!(user_id = %user.id, "User registered");

        self.send_verification(&user, &raw_token).await;
        self.issue(user)
    }

    /// Authenticate with e-mail and password.
    ///
    /// Checks run in order: throttle, lock, password, verification,
    /// activity. A wrong password counts towards the lockout threshold.
    pub async fn login(&self, input: LoginInput) -> CivicResult<LoginOutput> {
        let now = Utc::now();
        let email = normalize_email(&input.email);
        let throttle_key = format!("login:{}", input.client_key.as_deref().unwrap_or(&email));

        let hits = self
            .throttle
            .hit(&throttle_key, self.config.throttle_window_secs, now)
            .await?;
        if hits > self.config.throttle_max_attempts {
            warn!(key = %throttle_key, hits, "Login throttled");
            return Err(AuthError::RateLimited.into());
        }

        let user = match self.users.get_by_email(&email).await {
            Ok(u) => u,
            Err(CivicError::NotFound { .. }) => return Err(AuthError::InvalidCredentials.into()),
            Err(e) => return Err(e),
        };

        if let Some(until) = user.lock_until.filter(|until| *until > now) {
            return Err(AuthError::AccountLocked(until).into());
        }

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            return Err(self.record_failure(&user, now).await?.into());
        }

        if !user.is_verified {
            return Err(AuthError::EmailNotVerified.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountDeactivated.into());
        }

        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    login_attempts: Some(0),
                    lock_until: Some(None),
                    last_login: Some(now),
                    ..UpdateUser::default()
                },
            )
            .await?;
        self.throttle.reset(&throttle_key).await?;

        info!(user_id = %user.id, role = %user.role, "Login succeeded");
        self.issue(user)
    }

    /// Resolve a bearer credential to an active user.
    pub async fn resolve(&self, raw: &str) -> CivicResult<User> {
        let user_id = self.verifier.verify(raw)?;
        let user = match self.users.get_by_id(user_id).await {
            Ok(u) => u,
            Err(CivicError::NotFound { .. }) => {
                return Err(CivicError::Unauthenticated {
                    reason: "user no longer exists".into(),
                });
            }
            Err(e) => return Err(e),
        };
        if !user.is_active {
            return Err(AuthError::AccountDeactivated.into());
        }
        Ok(user)
    }

    /// Consume an e-mail verification token.
    pub async fn verify_email(&self, raw_token: &str) -> CivicResult<User> {
        let hash = token::hash_opaque_token(raw_token);
        let user = match self.users.get_by_verification_token(&hash).await {
            Ok(u) => u,
            Err(CivicError::NotFound { .. }) => {
                return Err(AuthError::VerificationTokenInvalid.into());
            }
            Err(e) => return Err(e),
        };
        if user
            .verification_expires_at
            .is_none_or(|deadline| deadline <= Utc::now())
        {
            return Err(AuthError::VerificationTokenInvalid.into());
        }

        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    is_verified: Some(true),
                    verification_token_hash: Some(None),
                    verification_expires_at: Some(None),
                    ..UpdateUser::default()
                },
            )
            .await?;
        info!(user_id = %user.id, "E-mail verified");

        let body = format!(
            "Hello {}!\n\nWelcome to Civic Reporting System!\n\nYour account is now active.\n\nThanks!",
            user.first_name
        );
        dispatch(
            &self.notifier,
            Notification::new(&user.email, WELCOME_SUBJECT, body),
        )
        .await;
        Ok(user)
    }

    /// Replace the outstanding verification token and send it again.
    pub async fn resend_verification(&self, user_id: Uuid) -> CivicResult<()> {
        let user = self.users.get_by_id(user_id).await?;
        if user.is_verified {
            return Err(AuthError::AlreadyVerified.into());
        }

        let raw_token = token::generate_opaque_token();
        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    verification_token_hash: Some(Some(token::hash_opaque_token(&raw_token))),
                    verification_expires_at: Some(Some(self.verification_deadline(Utc::now()))),
                    ..UpdateUser::default()
                },
            )
            .await?;
        self.send_verification(&user, &raw_token).await;
        Ok(())
    }

    pub async fn update_details(&self, user_id: Uuid, input: ProfileUpdate) -> CivicResult<User> {
        let first_name = input
            .first_name
            .map(|n| required_name("firstName", &n))
            .transpose()?;
        let last_name = input
            .last_name
            .map(|n| required_name("lastName", &n))
            .transpose()?;
        let phone = input.phone.map(|p| p.trim().to_string());
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }

        let user = self
            .users
            .update(
                user_id,
                UpdateUser {
                    first_name,
                    last_name,
                    phone,
                    address: input.address,
                    notification_preferences: input.notification_preferences,
                    ..UpdateUser::default()
                },
            )
            .await?;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Change the password after re-checking the current one. Returns a
    /// fresh access token.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> CivicResult<LoginOutput> {
        let user = self.users.get_by_id(user_id).await?;
        self.check_password(&user, current)?;
        password::check_policy(new, &self.config)?;

        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    password: Some(new.to_string()),
                    ..UpdateUser::default()
                },
            )
            .await?;
        info!(user_id = %user.id, "Password changed");
        self.issue(user)
    }

    /// Deactivate the caller's own account after re-checking the password.
    pub async fn delete_account(&self, user_id: Uuid, password: &str) -> CivicResult<()> {
        let user = self.users.get_by_id(user_id).await?;
        self.check_password(&user, password)?;
        self.users.deactivate(user.id).await?;
        info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Account administration
    // -----------------------------------------------------------------

    pub async fn list_users(
        &self,
        actor: &Actor,
        filter: UserFilter,
        pagination: Pagination,
    ) -> CivicResult<PaginatedResult<User>> {
        authorize(actor, &Action::ManageUsers)?;
        self.users.list(filter, pagination).await
    }

    pub async fn get_user(&self, actor: &Actor, user_id: Uuid) -> CivicResult<User> {
        authorize(actor, &Action::ManageUsers)?;
        self.users.get_by_id(user_id).await
    }

    pub async fn update_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        input: AccountUpdate,
    ) -> CivicResult<User> {
        authorize(actor, &Action::ManageUsers)?;
        let current = self.users.get_by_id(user_id).await?;

        let email = input.email.map(|e| normalize_email(&e));
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let phone = input.phone.map(|p| p.trim().to_string());
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }

        let role = input.role.unwrap_or(current.role);
        let department_id = input.department_id.unwrap_or(current.department_id);
        if role.requires_department() && department_id.is_none() {
            return Err(CivicError::validation(
                "MISSING_DEPARTMENT",
                format!("department is required for role {role}"),
            ));
        }

        let user = self
            .users
            .update(
                user_id,
                UpdateUser {
                    first_name: input.first_name,
                    last_name: input.last_name,
                    email,
                    phone,
                    role: input.role,
                    department_id: input.department_id,
                    admin_area: input.admin_area,
                    address: input.address,
                    is_active: input.is_active,
                    is_verified: input.is_verified,
                    ..UpdateUser::default()
                },
            )
            .await?;
        info!(admin_id = %actor.user_id, user_id = %user.id, "Account updated");
        Ok(user)
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Count a failed password and lock the account once the threshold
    /// is reached.
    async fn record_failure(&self, user: &User, now: DateTime<Utc>) -> CivicResult<AuthError> {
        let lock_until = now + Duration::seconds(self.config.lockout_duration_secs as i64);
        let user = self
            .users
            .record_failed_login(
                user.id,
                self.config.max_failed_login_attempts,
                now,
                lock_until,
            )
            .await?;

        Ok(match user.lock_until.filter(|until| *until > now) {
            Some(until) => {
                warn!(
                    user_id = %user.id,
                    attempts = user.login_attempts,
                    "Account locked after failed logins"
                );
                AuthError::AccountLocked(until)
            }
            None => AuthError::InvalidCredentials,
        })
    }

    fn check_password(&self, user: &User, candidate: &str) -> CivicResult<()> {
        let valid = password::verify_password(
            candidate,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if valid {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials.into())
        }
    }

    fn ensure_unused(&self, field: &str, lookup: CivicResult<User>) -> CivicResult<()> {
        match lookup {
            Ok(_) => Err(CivicError::DuplicateEntry {
                field: field.to_string(),
            }),
            Err(CivicError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn verification_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.config.verification_token_lifetime_secs as i64)
    }

    async fn send_verification(&self, user: &User, raw_token: &str) {
        let body = format!(
            "Hello {}!\n\nClick this link to verify your email:\n{}/verify-email/{}\n\nThanks!",
            user.first_name,
            self.config.frontend_url.trim_end_matches('/'),
            raw_token
        );
        dispatch(
            &self.notifier,
            Notification::new(&user.email, VERIFY_EMAIL_SUBJECT, body),
        )
        .await;
    }

    fn issue(&self, user: User) -> CivicResult<LoginOutput> {
        let access_token = token::issue_access_token(user.id, user.role, &self.config)?;
        Ok(LoginOutput {
            access_token,
            expires_in: self.config.access_token_lifetime_secs,
            user,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required_name(field: &str, value: &str) -> CivicResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CivicError::validation(
            "MISSING_FIELDS",
            format!("{field} is required"),
        ));
    }
    if value.chars().count() > 50 {
        return Err(CivicError::validation(
            "FIELD_TOO_LONG",
            format!("{field} cannot exceed 50 characters"),
        ));
    }
    Ok(value.to_string())
}
