//! Domain service for accounts and authentication.
//!
//! Handles registration, login, and resolving bearer tokens to an [`Actor`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::User;
use crate::domain::{Actor, RequestMeta, UserRole};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("A user with this phone number already exists")]
    PhoneTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Public profile of an account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone: user.phone,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Login/registration result: the profile plus the bearer token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user: UserInfo,
    pub token: String,
}

/// Account creation input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub phone: String,
    pub password: String,
    pub name: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a CUSTOMER account and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PhoneTaken`] if the phone number is registered.
    async fn register(
        &self,
        registration: Registration,
        meta: RequestMeta,
    ) -> Result<LoginResult, AuthError>;

    /// Verifies credentials and returns the account's token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(
        &self,
        phone: &str,
        password: &str,
        meta: RequestMeta,
    ) -> Result<LoginResult, AuthError>;

    /// Creates an account with an explicit role. Used to bootstrap staff.
    async fn create_user(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> Result<LoginResult, AuthError>;

    /// Resolves a token to the acting identity, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountDisabled`] for a deactivated account.
    async fn authenticate(&self, token: &str) -> Result<Option<Actor>, AuthError>;

    async fn get_user_info(&self, user_id: Uuid) -> Result<UserInfo, AuthError>;

    /// Replaces the caller's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if `current_password` is wrong
    /// and [`AuthError::Validation`] if the new password is too short or
    /// unchanged.
    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        meta: RequestMeta,
    ) -> Result<(), AuthError>;

    /// Issues a new token for the caller. The old token stops working.
    async fn regenerate_api_key(
        &self,
        user_id: Uuid,
        meta: RequestMeta,
    ) -> Result<String, AuthError>;

    /// Operator reset by phone number: always rotates the token, and sets
    /// the password when one is given. Used by the CLI, so no current
    /// password is required.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] for an unknown phone number.
    async fn reset_credentials(
        &self,
        phone: &str,
        new_password: Option<String>,
    ) -> Result<LoginResult, AuthError>;
}
