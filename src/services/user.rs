//! User service
//!
//! Implements business logic for user management:
//! - Registration (the first user becomes admin)
//! - Login/logout with session tokens
//! - Session validation and expired-session purging
//! - Profile and password changes

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Usernames: 3-50 chars, letters/digits/underscore/dash, starting with a letter
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{2,49}$").expect("valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Account is banned
    #[error("Account is banned")]
    Banned,

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new user.
    ///
    /// The first user in the system is automatically assigned the Admin
    /// role; everyone after that is a regular member.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Member
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = User::new(input.username, input.email, password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        Ok(created)
    }

    /// Login with credentials.
    ///
    /// Validates the provided credentials and creates a new session when
    /// they check out. Banned accounts cannot log in.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .find_user_by_username_or_email(&input.username_or_email)
            .await?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError("Invalid username or password".to_string())
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            return Err(UserServiceError::AuthenticationError(
                "Invalid username or password".to_string(),
            ));
        }

        if user.is_banned() {
            return Err(UserServiceError::Banned);
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(self.session_expiration_days),
            created_at: Utc::now(),
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    /// Logout by deleting the session
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Validate a session token and return the associated user.
    ///
    /// Returns `None` for unknown, expired, or banned-account sessions.
    /// Expired sessions are deleted as a side effect.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to load session")?
        {
            Some(session) => session,
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
            .context("Failed to load session user")?;

        Ok(user.filter(|u| u.is_active()))
    }

    /// Whether no user exists yet (the next registration becomes admin)
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Get a user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?)
    }

    /// Get a user by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?)
    }

    /// Update the user's own profile fields
    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        if let Some(ref display_name) = input.display_name {
            if display_name.len() > 100 {
                return Err(UserServiceError::ValidationError(
                    "Display name must be at most 100 characters".to_string(),
                ));
            }
        }
        if let Some(ref bio) = input.bio {
            if bio.len() > 500 {
                return Err(UserServiceError::ValidationError(
                    "Bio must be at most 500 characters".to_string(),
                ));
            }
        }

        let mut updated = user.clone();
        if let Some(display_name) = input.display_name {
            updated.display_name = if display_name.is_empty() {
                None
            } else {
                Some(display_name)
            };
        }
        if let Some(avatar) = input.avatar {
            updated.avatar = if avatar.is_empty() { None } else { Some(avatar) };
        }
        if let Some(bio) = input.bio {
            updated.bio = if bio.is_empty() { None } else { Some(bio) };
        }

        Ok(self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update profile")?)
    }

    /// Change the user's password.
    ///
    /// Requires the current password; all existing sessions are revoked.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_password(new_password)?;

        let mut updated = user.clone();
        updated.password_hash =
            hash_password(new_password).context("Failed to hash password")?;

        self.user_repo
            .update(&updated)
            .await
            .context("Failed to update password")?;

        self.session_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to revoke sessions")?;

        Ok(())
    }

    /// Delete expired sessions, returning the number removed
    pub async fn purge_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to purge sessions")?)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if username_or_email.contains('@') {
            Ok(self
                .user_repo
                .get_by_email(username_or_email)
                .await
                .context("Failed to look up user by email")?)
        } else {
            Ok(self
                .user_repo
                .get_by_username(username_or_email)
                .await
                .context("Failed to look up user by username")?)
        }
    }

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        if !USERNAME_RE.is_match(&input.username) {
            return Err(UserServiceError::ValidationError(
                "Username must be 3-50 characters, start with a letter, and contain only \
                 letters, digits, underscores, and dashes"
                    .to_string(),
            ));
        }

        if input.email.is_empty() || !input.email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }

        validate_password(&input.password)
    }
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.len() < 8 {
        return Err(UserServiceError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserStatus;

    async fn setup() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput::new(username, email, "password123")
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (_pool, service) = setup().await;

        let first = service
            .register(register_input("first", "first@example.com"))
            .await
            .expect("Registration failed");
        assert_eq!(first.role, UserRole::Admin);

        let second = service
            .register(register_input("second", "second@example.com"))
            .await
            .expect("Registration failed");
        assert_eq!(second.role, UserRole::Member);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_pool, service) = setup().await;

        service
            .register(register_input("duplicate", "a@example.com"))
            .await
            .expect("Registration failed");

        let result = service
            .register(register_input("duplicate", "b@example.com"))
            .await;

        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (_pool, service) = setup().await;

        service
            .register(register_input("usera", "same@example.com"))
            .await
            .expect("Registration failed");

        let result = service
            .register(register_input("userb", "same@example.com"))
            .await;

        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected() {
        let (_pool, service) = setup().await;

        // Too-short username
        let result = service
            .register(RegisterInput::new("ab", "x@example.com", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        // Username starting with a digit
        let result = service
            .register(RegisterInput::new("1abc", "x@example.com", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        // Invalid email
        let result = service
            .register(RegisterInput::new("valid", "notanemail", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        // Short password
        let result = service
            .register(RegisterInput::new("valid", "x@example.com", "short"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup().await;

        let user = service
            .register(register_input("loginuser", "login@example.com"))
            .await
            .expect("Registration failed");

        let session = service
            .login(LoginInput::new("loginuser", "password123"))
            .await
            .expect("Login failed");

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation failed")
            .expect("Session should be valid");

        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let (_pool, service) = setup().await;

        service
            .register(register_input("emailer", "emailer@example.com"))
            .await
            .expect("Registration failed");

        let session = service
            .login(LoginInput::new("emailer@example.com", "password123"))
            .await
            .expect("Login by email failed");

        assert!(!session.id.is_empty());
    }

    #[tokio::test]
    async fn test_login_wrong_password_rejected() {
        let (_pool, service) = setup().await;

        service
            .register(register_input("secure", "secure@example.com"))
            .await
            .expect("Registration failed");

        let result = service
            .login(LoginInput::new("secure", "wrong_password"))
            .await;

        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login() {
        let (pool, service) = setup().await;

        let user = service
            .register(register_input("troublemaker", "trouble@example.com"))
            .await
            .expect("Registration failed");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let mut banned = user.clone();
        banned.status = UserStatus::Banned;
        user_repo
            .update(&banned)
            .await
            .expect("Failed to ban user");

        let result = service
            .login(LoginInput::new("troublemaker", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::Banned)));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_pool, service) = setup().await;

        service
            .register(register_input("leaver", "leaver@example.com"))
            .await
            .expect("Registration failed");

        let session = service
            .login(LoginInput::new("leaver", "password123"))
            .await
            .expect("Login failed");

        service.logout(&session.id).await.expect("Logout failed");

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation failed");
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_deleted() {
        let (pool, service) = setup().await;

        let user = service
            .register(register_input("sleepy", "sleepy@example.com"))
            .await
            .expect("Registration failed");

        // Insert a pre-expired session directly
        let session_repo = SqlxSessionRepository::new(pool.clone());
        let expired = Session {
            id: "expired-token".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::hours(1),
            created_at: Utc::now() - Duration::days(8),
        };
        session_repo
            .create(&expired)
            .await
            .expect("Failed to create session");

        let validated = service
            .validate_session("expired-token")
            .await
            .expect("Validation failed");
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let (_pool, service) = setup().await;

        let user = service
            .register(register_input("changer", "changer@example.com"))
            .await
            .expect("Registration failed");

        let session = service
            .login(LoginInput::new("changer", "password123"))
            .await
            .expect("Login failed");

        service
            .change_password(&user, "password123", "new_password456")
            .await
            .expect("Password change failed");

        // Old session is gone
        assert!(service
            .validate_session(&session.id)
            .await
            .unwrap()
            .is_none());

        // Old password no longer works, new one does
        assert!(service
            .login(LoginInput::new("changer", "password123"))
            .await
            .is_err());
        assert!(service
            .login(LoginInput::new("changer", "new_password456"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (_pool, service) = setup().await;

        let user = service
            .register(register_input("strict", "strict@example.com"))
            .await
            .expect("Registration failed");

        let result = service
            .change_password(&user, "not_the_password", "new_password456")
            .await;

        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (_pool, service) = setup().await;

        let user = service
            .register(register_input("profiled", "profiled@example.com"))
            .await
            .expect("Registration failed");

        let updated = service
            .update_profile(
                &user,
                UpdateProfileInput {
                    display_name: Some("Night Writer".to_string()),
                    avatar: None,
                    bio: Some("I journal at 3am.".to_string()),
                },
            )
            .await
            .expect("Profile update failed");

        assert_eq!(updated.display_name.as_deref(), Some("Night Writer"));
        assert_eq!(updated.bio.as_deref(), Some("I journal at 3am."));

        // Empty string clears a field
        let cleared = service
            .update_profile(
                &updated,
                UpdateProfileInput {
                    display_name: Some(String::new()),
                    avatar: None,
                    bio: None,
                },
            )
            .await
            .expect("Profile update failed");
        assert!(cleared.display_name.is_none());
    }
}
