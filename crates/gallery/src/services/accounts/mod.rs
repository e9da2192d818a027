//! Account service.
//!
//! Local accounts sign in with email and password. Federated accounts are
//! vouched for by an external identity provider and have no password.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use bid_gallery_core::{Email, Role};

use crate::db::{GalleryStore, RepositoryError};
use crate::models::{NewUser, User};
use crate::services::identity::IdentityVerifier;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Registration and login.
pub struct AuthService<'a> {
    store: &'a dyn GalleryStore,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn GalleryStore) -> Self {
        Self { store }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new local account.
    ///
    /// `role` defaults to CUSTOMER. Only roles that may self-register are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidRole` / `RoleNotAllowed` for a bad role.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let role = requested_role(role)?;
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(&NewUser {
                email,
                role,
                password_hash: Some(password_hash),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "Account registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` if either field is blank.
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        // A malformed email cannot belong to an account.
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .store
            .user_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Federated Authentication
    // =========================================================================

    /// Login with an identity token from an external provider.
    ///
    /// The first sign-in of an unknown subject provisions a FEDERATED account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` for a blank token.
    /// Returns `AuthError::ExternalToken` if the provider rejects the token.
    pub async fn login_federated(
        &self,
        verifier: &dyn IdentityVerifier,
        id_token: &str,
    ) -> Result<User, AuthError> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let email = verifier.verify(id_token).await?;
        if let Some(user) = self.store.user_by_email(&email).await? {
            return Ok(user);
        }

        let new = NewUser {
            email,
            role: Role::Federated,
            password_hash: None,
        };
        let user = match self.store.create_user(&new).await {
            Ok(user) => user,
            // Lost a race with a concurrent first sign-in.
            Err(RepositoryError::Conflict(_)) => self
                .store
                .user_by_email(&new.email)
                .await?
                .ok_or(AuthError::InvalidCredentials)?,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "Federated account provisioned");
        Ok(user)
    }
}

fn requested_role(role: Option<&str>) -> Result<Role, AuthError> {
    let Some(raw) = role.filter(|r| !r.trim().is_empty()) else {
        return Ok(Role::Customer);
    };
    let role: Role = raw.parse().map_err(|_| AuthError::InvalidRole(raw.to_owned()))?;
    if !role.can_self_register() {
        return Err(AuthError::RoleNotAllowed(role));
    }
    Ok(role)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unreadable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::identity::IdentityError;

    struct FixedIdentity(&'static str);

    #[async_trait]
    impl IdentityVerifier for FixedIdentity {
        async fn verify(&self, id_token: &str) -> Result<Email, IdentityError> {
            if id_token == "good" {
                Ok(Email::parse(self.0)?)
            } else {
                Err(IdentityError::Rejected("bad token".to_owned()))
            }
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same-pass").unwrap(), hash_password("same-pass").unwrap());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let service = AuthService::new(&store);

        let user = service
            .register("Painter@Example.com", "brushes", Some("artist"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Artist);

        let logged_in = service.login("painter@example.com", "brushes").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_register_defaults_to_customer() {
        let store = MemoryStore::new();
        let user = AuthService::new(&store)
            .register("buyer@example.com", "secret1", None)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let store = MemoryStore::new();
        let service = AuthService::new(&store);

        assert!(matches!(
            service.register("a@b.dk", "12345", None).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            service.register("a@b.dk", "123456", Some("ADMIN")).await,
            Err(AuthError::RoleNotAllowed(Role::Admin))
        ));
        assert!(matches!(
            service.register("a@b.dk", "123456", Some("curator")).await,
            Err(AuthError::InvalidRole(_))
        ));
        assert!(matches!(
            service.register("not-an-email", "123456", None).await,
            Err(AuthError::InvalidEmail(_))
        ));

        service.register("a@b.dk", "123456", None).await.unwrap();
        assert!(matches!(
            service.register("A@B.dk", "654321", None).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let service = AuthService::new(&store);
        service.register("a@b.dk", "correct", None).await.unwrap();

        for (email, password) in [("a@b.dk", "wrong!"), ("nobody@b.dk", "correct"), ("bogus", "x")] {
            assert!(matches!(
                service.login(email, password).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            service.login(" ", "x").await,
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_federated_login_provisions_once() {
        let store = MemoryStore::new();
        let service = AuthService::new(&store);
        let verifier = FixedIdentity("fed@example.com");

        let first = service.login_federated(&verifier, "good").await.unwrap();
        assert_eq!(first.role, Role::Federated);
        let second = service.login_federated(&verifier, "good").await.unwrap();
        assert_eq!(first.id, second.id);

        // A federated account has no password to log in with.
        assert!(matches!(
            service.login("fed@example.com", "anything").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_federated_login_rejects_bad_token() {
        let store = MemoryStore::new();
        let service = AuthService::new(&store);
        let verifier = FixedIdentity("fed@example.com");

        assert!(matches!(
            service.login_federated(&verifier, "forged").await,
            Err(AuthError::ExternalToken(_))
        ));
        assert!(matches!(
            service.login_federated(&verifier, "  ").await,
            Err(AuthError::MissingCredentials)
        ));
    }
}
