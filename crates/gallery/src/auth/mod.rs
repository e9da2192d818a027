//! Sessions and access control.
//!
//! A request's identity is resolved exactly once: the `jwt` cookie is
//! decoded by the [`TokenCodec`], checked against the route's allowed roles
//! by the [`gate`], and the outcome is stored as a [`SessionContext`] in the
//! request extensions for handlers to extract.

pub mod context;
pub mod cookie;
pub mod gate;
pub mod token;

use serde::{Deserialize, Serialize};

use bid_gallery_core::{Email, Role, UserId};

pub use context::SessionContext;
pub use gate::{AccessDenied, AccessTable, authorize, authorize_request};
pub use token::{TokenCodec, TokenError};

/// A verified caller: who they are and what they may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub subject: Email,
    pub role: Role,
}

impl From<&crate::models::User> for Identity {
    fn from(user: &crate::models::User) -> Self {
        Self {
            user_id: user.id,
            subject: user.email.clone(),
            role: user.role,
        }
    }
}
