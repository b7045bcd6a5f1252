//! User service
//!
//! Identity and credentials:
//! - registration (regular accounts, university accounts, admin-created accounts)
//! - authentication with enumeration-safe failures
//! - cookie sessions (login, logout, validation)
//! - password change
//! - user administration and the bootstrap administrator

use crate::db::repositories::{is_unique_violation, SessionRepository, UserRepository};
use crate::models::{normalize_email, Role, Session, UpdateUserInput, User};
use crate::services::password::{
    hash_password, is_long_enough, verify_dummy, verify_password, MIN_PASSWORD_LENGTH,
};
use crate::services::policy::{authorize, Action, Caller, RecordOwnership, Resource};
use crate::services::rate_limiter::RateLimiters;
use crate::services::validation::{check_email, optional_text};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 14;

/// The one message for every failed login
pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub(crate) const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match.";
const EMAIL_TAKEN: &str = "A user with this email already exists.";

pub(crate) fn password_too_short() -> String {
    format!(
        "This password is too short. It must contain at least {} characters.",
        MIN_PASSWORD_LENGTH
    )
}

/// Input for self-registration and admin-created accounts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Administrator only
    #[serde(default)]
    pub role: Option<Role>,
    /// Required when `role` is university
    #[serde(default)]
    pub university_name: Option<String>,
}

/// Input for the university sign-up flow
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UniversityRegisterInput {
    pub email: String,
    #[serde(default)]
    pub university_name: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    limiters: Arc<RateLimiters>,
    session_lifetime: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        limiters: Arc<RateLimiters>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            limiters,
            session_lifetime: Duration::days(DEFAULT_SESSION_LIFETIME_DAYS),
        }
    }

    /// Override the session lifetime
    pub fn with_session_lifetime(mut self, days: i64) -> Self {
        self.session_lifetime = Duration::days(days);
        self
    }

    /// Register a new account.
    ///
    /// Anyone may register. Only an administrator may pick the role; everyone
    /// else gets a regular account.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if a non-administrator supplies `role`
    /// - `Validation` for a malformed or taken email, a password mismatch or a
    ///   short password, or a university account without a name
    pub async fn register(
        &self,
        caller: &Caller,
        input: RegisterInput,
    ) -> Result<User, ServiceError> {
        authorize(caller, Action::Create, Resource::User, None)?;

        if input.role.is_some() && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators can assign a role.".to_string(),
            ));
        }
        let role = input.role.unwrap_or_default();
        let email = normalize_email(&input.email);
        let university_name = optional_text(input.university_name);

        let mut errors = FieldErrors::new();
        check_email(&mut errors, "email", &email);
        check_new_password(&mut errors, &input.password, &input.password_confirm);
        if role == Role::University && university_name.is_none() {
            errors.add("university_name", "University name is required.");
        }
        errors.into_result()?;
        self.ensure_email_free(&email).await?;

        let mut user = User::new(email, hash_password(&input.password)?, role);
        user.first_name = input.first_name.trim().to_string();
        user.last_name = input.last_name.trim().to_string();
        if role == Role::University {
            user.university_name = university_name;
        }

        let created = self
            .user_repo
            .create(&user)
            .await
            .map_err(|e| email_conflict(e, "Failed to create user"))?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Register a university account (open sign-up)
    pub async fn register_university(
        &self,
        input: UniversityRegisterInput,
    ) -> Result<User, ServiceError> {
        let email = normalize_email(&input.email);
        let university_name = input.university_name.trim().to_string();

        let mut errors = FieldErrors::new();
        check_email(&mut errors, "email", &email);
        if university_name.is_empty() {
            errors.add("university_name", "University name is required.");
        }
        check_new_password(&mut errors, &input.password, &input.password_confirm);
        errors.into_result()?;
        self.ensure_email_free(&email).await?;

        let mut user = User::new(email, hash_password(&input.password)?, Role::University);
        user.university_name = Some(university_name);

        let created = self
            .user_repo
            .create(&user)
            .await
            .map_err(|e| email_conflict(e, "Failed to create university user"))?;

        tracing::info!(user_id = created.id, "University account registered");
        Ok(created)
    }

    /// Check credentials.
    ///
    /// Unknown email, wrong password and inactive account fail with the same
    /// error. An unknown email still pays for one hash verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email);
        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?;

        let Some(user) = user else {
            verify_dummy(password);
            return Err(invalid_credentials());
        };

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid || !user.is_active {
            return Err(invalid_credentials());
        }

        Ok(user)
    }

    /// Log in and open a session.
    ///
    /// Failed attempts are counted per email; after five in fifteen minutes
    /// the email is locked out until the window passes.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), ServiceError> {
        let key = normalize_email(&input.email);
        if let Some(retry_after_secs) = self.limiters.login.retry_after(&key).await {
            tracing::warn!(retry_after_secs, "Login rate limited");
            return Err(ServiceError::RateLimited { retry_after_secs });
        }

        let mut user = match self.authenticate(&key, &input.password).await {
            Ok(user) => user,
            Err(err) => {
                if matches!(err, ServiceError::Authentication(_)) {
                    self.limiters.login.record(&key).await;
                    tracing::info!("Login failed");
                }
                return Err(err);
            }
        };
        self.limiters.login.clear(&key).await;

        let session = self.start_session(&user).await?;
        let now = Utc::now();
        self.user_repo
            .update_last_login(user.id, now)
            .await
            .context("Failed to record last login")?;
        user.last_login = Some(now);

        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, session))
    }

    /// Open a session for an already verified user
    pub async fn start_session(&self, user: &User) -> Result<Session, ServiceError> {
        let session = Session::new(user.id, self.session_lifetime);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), ServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        tracing::info!("User logged out");
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired sessions, and sessions of inactive users, resolve
    /// to `None`. Expired sessions are removed on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, ServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    /// Change the caller's password and end their other sessions.
    ///
    /// `current_session` is kept alive so the caller stays logged in.
    pub async fn change_password(
        &self,
        caller: &Caller,
        current_session: Option<&str>,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        let user = caller.user().ok_or(ServiceError::Unauthenticated)?;

        let mut errors = FieldErrors::new();
        let old_ok = verify_password(&input.old_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !old_ok {
            errors.add("old_password", "Wrong password.");
        }
        if input.new_password != input.new_password_confirm {
            errors.add("new_password_confirm", PASSWORDS_DO_NOT_MATCH);
        }
        if !is_long_enough(&input.new_password) {
            errors.add("new_password", password_too_short());
        }
        errors.into_result()?;

        let hash = hash_password(&input.new_password)?;
        self.user_repo
            .update_password(user.id, &hash)
            .await
            .context("Failed to update password")?;

        let dropped = match current_session {
            Some(keep) => self.session_repo.delete_by_user_except(user.id, keep).await,
            None => self.session_repo.delete_by_user(user.id).await,
        }
        .context("Failed to delete sessions")?;

        tracing::info!(user_id = user.id, dropped_sessions = dropped, "Password changed");
        Ok(())
    }

    /// The caller's own account
    pub fn me(&self, caller: &Caller) -> Result<User, ServiceError> {
        authorize(caller, Action::ListOwn, Resource::User, None)?;
        caller.user().cloned().ok_or(ServiceError::Unauthenticated)
    }

    pub async fn list_users(&self, caller: &Caller) -> Result<Vec<User>, ServiceError> {
        authorize(caller, Action::List, Resource::User, None)?;
        let users = self.user_repo.list().await.context("Failed to list users")?;
        Ok(users)
    }

    pub async fn get_user(&self, caller: &Caller, id: i64) -> Result<User, ServiceError> {
        authorize(
            caller,
            Action::Retrieve,
            Resource::User,
            Some(&RecordOwnership::Account(id)),
        )?;
        self.load(id).await
    }

    /// Update an account.
    ///
    /// Users edit their own profile; `role`, `is_staff` and `is_active` are
    /// reserved for administrators. Deactivation ends every session of the user.
    pub async fn update_user(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, ServiceError> {
        authorize(
            caller,
            Action::Update,
            Resource::User,
            Some(&RecordOwnership::Account(id)),
        )?;
        if input.touches_privileged_fields() && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators can change role, staff or active status.".to_string(),
            ));
        }

        let mut user = self.load(id).await?;
        let was_active = user.is_active;
        let mut errors = FieldErrors::new();

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            check_email(&mut errors, "email", &email);
            if errors.is_empty() && email != user.email {
                let taken = self
                    .user_repo
                    .exists_by_email(&email)
                    .await
                    .context("Failed to check email")?;
                if taken {
                    errors.add("email", EMAIL_TAKEN);
                }
            }
            user.email = email;
        }
        if let Some(first_name) = input.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name.trim().to_string();
        }
        let university_name = input.university_name.map(|name| optional_text(Some(name)));
        if let Some(university_name) = university_name.clone() {
            user.university_name = university_name;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(is_staff) = input.is_staff {
            user.is_staff = is_staff;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }

        if user.role == Role::University {
            if user.university_name.is_none() {
                errors.add("university_name", "University name is required.");
            }
        } else {
            if matches!(university_name, Some(Some(_))) {
                errors.add(
                    "university_name",
                    "Only university accounts can have a university name.",
                );
            }
            user.university_name = None;
        }
        errors.into_result()?;

        user.updated_at = Utc::now();
        let updated = self
            .user_repo
            .update(&user)
            .await
            .map_err(|e| email_conflict(e, "Failed to update user"))?;

        if was_active && !updated.is_active {
            let dropped = self
                .session_repo
                .delete_by_user(updated.id)
                .await
                .context("Failed to delete sessions")?;
            tracing::info!(user_id = updated.id, dropped_sessions = dropped, "User deactivated");
        }

        Ok(updated)
    }

    pub async fn delete_user(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(
            caller,
            Action::Delete,
            Resource::User,
            Some(&RecordOwnership::Account(id)),
        )?;
        let deleted = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        if !deleted {
            return Err(ServiceError::not_found("User"));
        }
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Create an administrator unless the email is already registered.
    ///
    /// Returns the new account, or `None` when the email already exists.
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let email = normalize_email(email);
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "email", &email);
        if !is_long_enough(password) {
            errors.add("password", password_too_short());
        }
        errors.into_result()?;

        if self
            .user_repo
            .exists_by_email(&email)
            .await
            .context("Failed to check email")?
        {
            return Ok(None);
        }

        let admin = User::new(email, hash_password(password)?, Role::Administrator);
        let created = self
            .user_repo
            .create(&admin)
            .await
            .context("Failed to create administrator")?;

        tracing::info!(user_id = created.id, "Administrator account created");
        Ok(Some(created))
    }

    /// Delete all expired sessions (maintenance)
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, ServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn load(&self, id: i64) -> Result<User, ServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), ServiceError> {
        let taken = self
            .user_repo
            .exists_by_email(email)
            .await
            .context("Failed to check email")?;
        if taken {
            return Err(ServiceError::field("email", EMAIL_TAKEN));
        }
        Ok(())
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Authentication(INVALID_CREDENTIALS.to_string())
}

fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password != confirm {
        errors.add("password_confirm", PASSWORDS_DO_NOT_MATCH);
    }
    if !is_long_enough(password) {
        errors.add("password", password_too_short());
    }
}

/// A lost race on the email UNIQUE index reads as the usual field error
fn email_conflict(err: anyhow::Error, context: &'static str) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::field("email", EMAIL_TAKEN)
    } else {
        ServiceError::Internal(err.context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(user_repo, session_repo, Arc::new(RateLimiters::new()));

        (pool, service)
    }

    fn register_input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
            ..Default::default()
        }
    }

    async fn admin_caller(service: &UserService) -> Caller {
        let admin = service
            .ensure_admin("admin@ex.edu", "adminpass1")
            .await
            .expect("Failed to create admin")
            .expect("Admin should be new");
        Caller::User(admin)
    }

    fn field_messages(err: ServiceError, field: &str) -> Vec<String> {
        match err {
            ServiceError::Validation(errors) => errors.messages(field).to_vec(),
            other => panic!("expected validation error, got {other}"),
        }
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_regular_user() {
        let (_pool, service) = setup_test_service().await;

        let mut input = register_input("  Student@Ex.EDU ", "Passw0rd!");
        input.first_name = " Ada ".to_string();
        let user = service
            .register(&Caller::Anonymous, input)
            .await
            .expect("Failed to register");

        assert_eq!(user.email, "student@ex.edu");
        assert_eq!(user.role, Role::Regular);
        assert_eq!(user.first_name, "Ada");
        assert_ne!(user.password_hash, "Passw0rd!");
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_register_role_requires_admin() {
        let (_pool, service) = setup_test_service().await;

        let mut input = register_input("x@ex.edu", "Passw0rd!");
        input.role = Some(Role::Administrator);
        let result = service.register(&Caller::Anonymous, input).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let admin = admin_caller(&service).await;
        let mut input = register_input("uni@ex.edu", "Passw0rd!");
        input.role = Some(Role::University);
        input.university_name = Some("Example University".to_string());
        let user = service.register(&admin, input).await.expect("Failed to register");
        assert_eq!(user.role, Role::University);
        assert_eq!(user.university_name.as_deref(), Some("Example University"));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_case_insensitive() {
        let (_pool, service) = setup_test_service().await;

        service
            .register(&Caller::Anonymous, register_input("same@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register first user");

        let err = service
            .register(&Caller::Anonymous, register_input("SAME@ex.edu", "Passw0rd!"))
            .await
            .unwrap_err();
        assert_eq!(field_messages(err, "email"), [EMAIL_TAKEN]);
    }

    /// Reports every email as free, like a registration that lost the race
    /// between the existence check and the insert
    struct StaleEmailCheck(SqlxUserRepository);

    #[async_trait::async_trait]
    impl UserRepository for StaleEmailCheck {
        async fn create(&self, user: &User) -> anyhow::Result<User> {
            self.0.create(user).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.get_by_id(id).await
        }
        async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            self.0.get_by_email(email).await
        }
        async fn exists_by_email(&self, _email: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn list(&self) -> anyhow::Result<Vec<User>> {
            self.0.list().await
        }
        async fn update(&self, user: &User) -> anyhow::Result<User> {
            self.0.update(user).await
        }
        async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
            self.0.update_password(id, password_hash).await
        }
        async fn update_last_login(
            &self,
            id: i64,
            at: chrono::DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.0.update_last_login(id, at).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.0.delete(id).await
        }
        async fn count_by_role(&self, role: Role) -> anyhow::Result<i64> {
            self.0.count_by_role(role).await
        }
    }

    #[tokio::test]
    async fn test_duplicate_insert_reports_email_taken() {
        let (pool, _) = setup_test_service().await;
        let service = UserService::new(
            Arc::new(StaleEmailCheck(SqlxUserRepository::new(pool.clone()))),
            SqlxSessionRepository::boxed(pool),
            Arc::new(RateLimiters::new()),
        );

        service
            .register(&Caller::Anonymous, register_input("race@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let err = service
            .register(&Caller::Anonymous, register_input("race@ex.edu", "Passw0rd!"))
            .await
            .unwrap_err();
        assert_eq!(field_messages(err, "email"), [EMAIL_TAKEN]);
    }

    #[tokio::test]
    async fn test_register_reports_all_field_errors() {
        let (_pool, service) = setup_test_service().await;

        let input = RegisterInput {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            password_confirm: "different".to_string(),
            ..Default::default()
        };
        let err = service.register(&Caller::Anonymous, input).await.unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert!(errors.contains("email"));
                assert!(errors.contains("password"));
                assert!(errors.contains("password_confirm"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_register_university() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .register_university(UniversityRegisterInput {
                email: "u@ex.edu".to_string(),
                university_name: "Example University".to_string(),
                password: "Passw0rd!".to_string(),
                password_confirm: "Passw0rd!".to_string(),
            })
            .await
            .expect("Failed to register university");

        assert_eq!(user.role, Role::University);
        assert_eq!(user.full_name(), "Example University");

        let err = service
            .register_university(UniversityRegisterInput {
                email: "v@ex.edu".to_string(),
                university_name: "   ".to_string(),
                password: "Passw0rd!".to_string(),
                password_confirm: "Passw0rd!".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(field_messages(err, "university_name").len(), 1);
    }

    // ========================================================================
    // Authentication and session tests
    // ========================================================================

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(&Caller::Anonymous, register_input("known@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        let user = service
            .authenticate("Known@ex.edu", "Passw0rd!")
            .await
            .expect("Correct credentials should authenticate");
        assert_eq!(user.email, "known@ex.edu");

        let wrong_password = service.authenticate("known@ex.edu", "wrong-pass").await.unwrap_err();
        let unknown_email = service.authenticate("nobody@ex.edu", "Passw0rd!").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, ServiceError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_authenticate() {
        let (_pool, service) = setup_test_service().await;
        let admin = admin_caller(&service).await;
        let user = service
            .register(&Caller::Anonymous, register_input("gone@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        let input = UpdateUserInput {
            is_active: Some(false),
            ..Default::default()
        };
        service.update_user(&admin, user.id, input).await.expect("Failed to deactivate");

        let err = service.authenticate("gone@ex.edu", "Passw0rd!").await.unwrap_err();
        assert_eq!(err.to_string(), invalid_credentials().to_string());
    }

    #[tokio::test]
    async fn test_login_creates_session() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(&Caller::Anonymous, register_input("login@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        let (user, session) = service
            .login(LoginInput::new("login@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to login");

        assert!(user.last_login.is_some());
        assert_eq!(session.user_id, user.id);

        let resolved = service
            .validate_session(&session.id)
            .await
            .expect("Failed to validate session")
            .expect("Session should resolve");
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.expect("Failed to logout");
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_failures() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(&Caller::Anonymous, register_input("brute@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        for _ in 0..5 {
            let result = service.login(LoginInput::new("brute@ex.edu", "wrong-pass")).await;
            assert!(matches!(result, Err(ServiceError::Authentication(_))));
        }

        let result = service.login(LoginInput::new("brute@ex.edu", "Passw0rd!")).await;
        assert!(matches!(result, Err(ServiceError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .register(&Caller::Anonymous, register_input("old@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        let expired = Session::new(user.id, Duration::seconds(-60));
        service
            .session_repo
            .create(&expired)
            .await
            .expect("Failed to create session");

        assert!(service.validate_session(&expired.id).await.unwrap().is_none());
        assert!(service.session_repo.get_by_id(&expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_keeps_current_session_only() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(&Caller::Anonymous, register_input("change@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to register");

        let (user, current) = service
            .login(LoginInput::new("change@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to login");
        let (_, other) = service
            .login(LoginInput::new("change@ex.edu", "Passw0rd!"))
            .await
            .expect("Failed to login");

        let caller = Caller::User(user);
        let err = service
            .change_password(
                &caller,
                Some(&current.id),
                ChangePasswordInput {
                    old_password: "nope-nope".to_string(),
                    new_password: "NewPassw0rd!".to_string(),
                    new_password_confirm: "NewPassw0rd?".to_string(),
                },
            )
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert!(errors.contains("old_password"));
                assert!(errors.contains("new_password_confirm"));
            }
            other => panic!("unexpected error: {other}"),
        }

        service
            .change_password(
                &caller,
                Some(&current.id),
                ChangePasswordInput {
                    old_password: "Passw0rd!".to_string(),
                    new_password: "NewPassw0rd!".to_string(),
                    new_password_confirm: "NewPassw0rd!".to_string(),
                },
            )
            .await
            .expect("Failed to change password");

        assert!(service.validate_session(&current.id).await.unwrap().is_some());
        assert!(service.validate_session(&other.id).await.unwrap().is_none());
        assert!(service.authenticate("change@ex.edu", "NewPassw0rd!").await.is_ok());
        assert!(service.authenticate("change@ex.edu", "Passw0rd!").await.is_err());
    }

    #[tokio::test]
    async fn test_change_password_requires_login() {
        let (_pool, service) = setup_test_service().await;
        let result = service
            .change_password(
                &Caller::Anonymous,
                None,
                ChangePasswordInput {
                    old_password: "a".to_string(),
                    new_password: "b".to_string(),
                    new_password_confirm: "b".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Unauthenticated)));
    }

    // ========================================================================
    // Administration tests
    // ========================================================================

    #[tokio::test]
    async fn test_users_edit_only_their_profile() {
        let (_pool, service) = setup_test_service().await;
        let alice = service
            .register(&Caller::Anonymous, register_input("alice@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let bob = service
            .register(&Caller::Anonymous, register_input("bob@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let as_alice = Caller::User(alice.clone());

        let input = UpdateUserInput {
            last_name: Some("Lovelace".to_string()),
            ..Default::default()
        };
        let updated = service.update_user(&as_alice, alice.id, input.clone()).await.unwrap();
        assert_eq!(updated.last_name, "Lovelace");

        let result = service.update_user(&as_alice, bob.id, input).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let promote = UpdateUserInput {
            role: Some(Role::Administrator),
            ..Default::default()
        };
        let result = service.update_user(&as_alice, alice.id, promote).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let result = service
            .update_user(
                &as_alice,
                alice.id,
                UpdateUserInput {
                    email: Some("BOB@ex.edu".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(field_messages(result.unwrap_err(), "email"), [EMAIL_TAKEN]);
    }

    #[tokio::test]
    async fn test_university_cannot_blank_its_name() {
        let (_pool, service) = setup_test_service().await;
        let uni = service
            .register_university(UniversityRegisterInput {
                email: "u@ex.edu".to_string(),
                university_name: "Example University".to_string(),
                password: "Passw0rd!".to_string(),
                password_confirm: "Passw0rd!".to_string(),
            })
            .await
            .unwrap();

        let result = service
            .update_user(
                &Caller::User(uni.clone()),
                uni.id,
                UpdateUserInput {
                    university_name: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_regular_user_cannot_claim_university_name() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .register(&Caller::Anonymous, register_input("plain@ex.edu", "Passw0rd!"))
            .await
            .unwrap();

        let result = service
            .update_user(
                &Caller::User(user.clone()),
                user.id,
                UpdateUserInput {
                    university_name: Some("Fake University".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(
            field_messages(result.unwrap_err(), "university_name"),
            ["Only university accounts can have a university name."]
        );

        let stored = service.get_user(&Caller::User(user.clone()), user.id).await.unwrap();
        assert_eq!(stored.university_name, None);
    }

    #[tokio::test]
    async fn test_demoted_university_loses_its_name() {
        let (_pool, service) = setup_test_service().await;
        let admin = admin_caller(&service).await;
        let uni = service
            .register_university(UniversityRegisterInput {
                email: "u@ex.edu".to_string(),
                university_name: "Real U".to_string(),
                password: "Passw0rd!".to_string(),
                password_confirm: "Passw0rd!".to_string(),
            })
            .await
            .unwrap();

        let demoted = service
            .update_user(
                &admin,
                uni.id,
                UpdateUserInput {
                    role: Some(Role::Regular),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(demoted.role, Role::Regular);
        assert_eq!(demoted.university_name, None);
    }

    #[tokio::test]
    async fn test_deactivation_ends_sessions() {
        let (_pool, service) = setup_test_service().await;
        let admin = admin_caller(&service).await;
        service
            .register(&Caller::Anonymous, register_input("leaver@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let (user, session) = service
            .login(LoginInput::new("leaver@ex.edu", "Passw0rd!"))
            .await
            .unwrap();

        service
            .update_user(
                &admin,
                user.id,
                UpdateUserInput {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(service.session_repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_delete_are_admin_only() {
        let (_pool, service) = setup_test_service().await;
        let admin = admin_caller(&service).await;
        let user = service
            .register(&Caller::Anonymous, register_input("plain@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let as_user = Caller::User(user.clone());

        assert!(matches!(service.list_users(&as_user).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            service.list_users(&Caller::Anonymous).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert_eq!(service.list_users(&admin).await.unwrap().len(), 2);

        assert!(matches!(
            service.delete_user(&as_user, user.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        service.delete_user(&admin, user.id).await.expect("Failed to delete");
        assert!(matches!(
            service.get_user(&admin, user.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_me() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(service.me(&Caller::Anonymous), Err(ServiceError::Unauthenticated)));

        let user = service
            .register(&Caller::Anonymous, register_input("me@ex.edu", "Passw0rd!"))
            .await
            .unwrap();
        let me = service.me(&Caller::User(user.clone())).unwrap();
        assert_eq!(me.id, user.id);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let (_pool, service) = setup_test_service().await;

        let first = service.ensure_admin("Root@Ex.edu", "adminpass1").await.unwrap();
        let admin = first.expect("First call should create the admin");
        assert_eq!(admin.role, Role::Administrator);
        assert!(admin.is_staff);

        let second = service.ensure_admin("root@ex.edu", "adminpass1").await.unwrap();
        assert!(second.is_none());
    }
}
