//! Account roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

/// Role attached to every marketplace account and carried in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "gallery.account_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Gallery operator.
    Admin,
    /// Lists artworks and sets reserve prices.
    Artist,
    /// Buyer with a local password account.
    Customer,
    /// Buyer signed in through an external identity provider.
    Federated,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 4] = [Self::Admin, Self::Artist, Self::Customer, Self::Federated];

    /// Canonical upper-case name, as stored and as carried in tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Artist => "ARTIST",
            Self::Customer => "CUSTOMER",
            Self::Federated => "FEDERATED",
        }
    }

    /// Whether an anonymous caller may pick this role at registration.
    #[must_use]
    pub const fn can_self_register(self) -> bool {
        matches!(self, Self::Artist | Self::Customer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}
