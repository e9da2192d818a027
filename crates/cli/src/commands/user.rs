//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! gallery-cli user create -e admin@example.com -r admin -p 's3cret!'
//! gallery-cli user create -e painter@example.com -r artist -p 's3cret!'
//! ```
//!
//! Unlike public registration, any role may be created here, `ADMIN` included.

use bid_gallery_core::{Email, EmailError, Role};
use bid_gallery_server::db::{GalleryStore, PgStore, RepositoryError, create_pool};
use bid_gallery_server::models::NewUser;
use bid_gallery_server::services::accounts::hash_password;
use thiserror::Error;

use super::database_url;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: customer, artist, admin, federated")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password could not be hashed.
    #[error("Could not hash password")]
    PasswordHash,

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a new user account.
///
/// Without a password the account can only sign in through the identity
/// provider.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken or the
/// database is unreachable.
pub async fn create(email: &str, role: &str, password: Option<&str>) -> Result<i32, UserError> {
    dotenvy::dotenv().ok();

    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email)?;
    let password_hash = password
        .map(hash_password)
        .transpose()
        .map_err(|_| UserError::PasswordHash)?;

    let url = database_url().ok_or(UserError::MissingEnvVar("GALLERY_DATABASE_URL"))?;

    tracing::info!("Connecting to gallery database...");
    let store = PgStore::new(create_pool(&url).await?);

    tracing::info!("Creating user: {} ({})", email, role);
    let user = store
        .create_user(&NewUser {
            email: email.clone(),
            role,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    if password.is_none() {
        tracing::warn!("Note: User has no password and can only sign in via the identity provider.");
    }

    Ok(user.id.as_i32())
}
