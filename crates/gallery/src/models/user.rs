//! Marketplace account types.

use chrono::{DateTime, Utc};

use bid_gallery_core::{Email, Role, UserId};

/// A marketplace account (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account to be created.
///
/// Federated accounts have no local password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub role: Role,
    pub password_hash: Option<String>,
}
