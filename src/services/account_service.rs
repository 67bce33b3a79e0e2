//! Domain service for the account lifecycle.
//!
//! Handles registration, email verification, login, API key rotation and
//! self-service deactivation.

use thiserror::Error;

use crate::db::User;
use crate::domain::forms::FormErrors;

pub const MSG_INVALID_EMAIL: &str = "Enter a valid email address.";
pub const MSG_BLOCKED_EMAIL: &str = "This email address is invalid.";
pub const MSG_DUPLICATE_EMAIL: &str = "A user with the same email address has already registered.";
pub const MSG_PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const MSG_BAD_CREDENTIALS: &str =
    "Please enter a correct email and password. Note that both fields may be case-sensitive.";
pub const MSG_UNVERIFIED: &str = "This email is registered but not yet verified.";

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0:?}")]
    Validation(FormErrors),

    /// Wrong password, unknown email and deactivated account all map here.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Verification link is invalid or expired")]
    InvalidVerificationLink,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Raw registration form input.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
    pub agreed_to_tos: bool,
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Validates the form, creates an unverified user and emails the
    /// verification link.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] with every field problem found.
    async fn register(&self, input: RegistrationInput) -> Result<User, AccountError>;

    /// Consumes a verification link: marks the email verified, provisions an
    /// API key and grants the daily case allowance.
    async fn verify_email(&self, user_id: i32, nonce: &str) -> Result<User, AccountError>;

    /// Sends the verification email again. Unknown or already verified
    /// addresses succeed silently.
    async fn resend_verification(&self, email: &str) -> Result<(), AccountError>;

    /// Checks credentials.
    ///
    /// # Errors
    ///
    /// [`AccountError::InvalidCredentials`] for unknown email, wrong password
    /// or a deactivated account; [`AccountError::EmailNotVerified`] when the
    /// password is right but the address is unverified.
    async fn login(&self, email: &str, password: &str) -> Result<User, AccountError>;

    /// Loads an active (not deactivated) user.
    async fn active_user(&self, user_id: i32) -> Result<Option<User>, AccountError>;

    async fn api_key(&self, user_id: i32) -> Result<Option<String>, AccountError>;

    /// Replaces the user's API key and emails a confirmation. Returns the new key.
    async fn rotate_api_key(&self, user_id: i32) -> Result<String, AccountError>;

    /// Soft-deletes the account and revokes its API key.
    async fn deactivate(&self, user_id: i32) -> Result<(), AccountError>;
}
