//! Account error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::identity::IdentityError;

/// Errors that can occur during registration and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bid_gallery_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or password was left blank.
    #[error("email and password are required")]
    MissingCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The role name is not one we know.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// The role exists but cannot be chosen at sign-up.
    #[error("role {0} cannot self-register")]
    RoleNotAllowed(bid_gallery_core::Role),

    /// The federated identity token was refused or could not be checked.
    #[error(transparent)]
    ExternalToken(#[from] IdentityError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
