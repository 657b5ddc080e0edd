use crate::auth::models::{RegisterRequest, UserPrincipal};
use crate::auth::repository::{UserRepository, UserRepositoryTrait};
use crate::error::AppError;
use crate::session::Session;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Session key holding the serialized principal of a logged-in visitor.
pub const USER_KEY: &str = "user";

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no user with that username")]
    NotFound,

    #[error("password does not match")]
    BadCredential,

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Invalid(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("user store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Local username/password strategy plus the session bookkeeping around it.
#[derive(Clone)]
pub struct AuthService {
    user_repository: Arc<dyn UserRepositoryTrait + Send + Sync>,
    argon2: Argon2<'static>,
    password_min_length: usize,
}

impl AuthService {
    pub fn new(user_repository: UserRepository, password_min_length: usize) -> Self {
        Self::with_repository(Arc::new(user_repository), password_min_length)
    }

    pub fn with_repository(
        user_repository: Arc<dyn UserRepositoryTrait + Send + Sync>,
        password_min_length: usize,
    ) -> Self {
        Self {
            user_repository,
            argon2: Argon2::default(),
            password_min_length,
        }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserPrincipal, AuthError> {
        let user = self
            .user_repository
            .find_by_username(username)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.verify_password(password, &user.password_hash)? {
            debug!(username, "password mismatch");
            return Err(AuthError::BadCredential);
        }

        Ok(UserPrincipal::from(user))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserPrincipal, AuthError> {
        let username = request.username.trim();
        let email = request.email.trim();
        self.validate_registration(username, email, &request.password)?;

        let password_hash = self.hash_password(&request.password)?;
        let user = self.user_repository.create(username, email, &password_hash).await?;

        info!(user_id = user.id, username = %user.username, "registered user");
        Ok(UserPrincipal::from(user))
    }

    /// Identifier stored in the session for a principal.
    pub fn serialize(&self, principal: &UserPrincipal) -> String {
        principal.id.to_string()
    }

    /// Rebuilds the principal for a stored identifier. Unknown or malformed
    /// identifiers give `None` so the request continues anonymously.
    pub async fn deserialize(&self, identifier: &str) -> Result<Option<UserPrincipal>, AuthError> {
        let Ok(id) = identifier.parse::<i64>() else {
            debug!(identifier, "malformed user identifier in session");
            return Ok(None);
        };

        Ok(self
            .user_repository
            .find_by_id(id)
            .await?
            .map(UserPrincipal::from))
    }

    /// Binds `principal` to the session under a fresh session id.
    pub fn login(&self, session: &Session, principal: &UserPrincipal) -> Result<(), AppError> {
        session.cycle_id();
        session.insert(USER_KEY, self.serialize(principal))
    }

    pub fn logout(&self, session: &Session) {
        session.remove(USER_KEY);
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Hash(format!("Invalid password hash: {}", e)))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn validate_registration(&self, username: &str, email: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::Invalid("No username was given".to_string()));
        }

        if username.len() > 50 {
            return Err(AuthError::Invalid(
                "Username cannot be longer than 50 characters".to_string(),
            ));
        }

        if email.is_empty() {
            return Err(AuthError::Invalid("Email cannot be empty".to_string()));
        }

        if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
            return Err(AuthError::Invalid("Invalid email format".to_string()));
        }

        if password.is_empty() {
            return Err(AuthError::Invalid("No password was given".to_string()));
        }

        if password.chars().count() < self.password_min_length {
            return Err(AuthError::Invalid(format!(
                "Password must be at least {} characters long",
                self.password_min_length
            )));
        }

        Ok(())
    }
}
