//! Role-based authorization.
//!
//! Every route declares the roles allowed to call it in an explicit
//! [`AccessTable`]. An empty role set marks a public route. Routes missing
//! from the table are open to any signed-in role.
//!
//! | Identity | Allowed roles     | Outcome              |
//! |----------|-------------------|----------------------|
//! | any      | empty (public)    | proceed              |
//! | none     | non-empty         | `Unauthenticated` 401 |
//! | present  | does not include  | `Forbidden` 403      |
//! | present  | includes role     | proceed              |

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use bid_gallery_core::Role;

use super::{Identity, SessionContext, TokenError, cookie};
use crate::error::{AppError, set_sentry_user};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Role set of a public route.
pub const PUBLIC: &[Role] = &[];

/// Role set accepting any signed-in caller.
pub const ANY_ROLE: &[Role] = &Role::ALL;

/// Why a request was refused at the gate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Insufficient permissions")]
    Forbidden,
}

/// Decide whether a caller may use a route allowing `allowed` roles.
///
/// # Errors
///
/// Returns `AccessDenied::Unauthenticated` for a guest on a non-public
/// route, and `AccessDenied::Forbidden` for a role outside `allowed`.
pub fn authorize(identity: Option<&Identity>, allowed: &[Role]) -> Result<(), AccessDenied> {
    if allowed.is_empty() {
        return Ok(());
    }

    let identity = identity.ok_or(AccessDenied::Unauthenticated)?;
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden)
    }
}

#[derive(Debug, Clone)]
struct AccessRule {
    method: Method,
    path: &'static str,
    roles: &'static [Role],
}

/// Explicit mapping from `(method, route pattern)` to allowed roles.
#[derive(Debug, Clone)]
pub struct AccessTable {
    rules: Vec<AccessRule>,
    fallback: &'static [Role],
}

impl Default for AccessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessTable {
    /// An empty table: every route requires a signed-in caller.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: ANY_ROLE,
        }
    }

    /// Declare the roles allowed on a route. Later declarations win.
    #[must_use]
    pub fn allow(mut self, method: Method, path: &'static str, roles: &'static [Role]) -> Self {
        self.rules.retain(|rule| !(rule.method == method && rule.path == path));
        self.rules.push(AccessRule {
            method,
            path,
            roles,
        });
        self
    }

    /// Declare a route public.
    #[must_use]
    pub fn public(self, method: Method, path: &'static str) -> Self {
        self.allow(method, path, PUBLIC)
    }

    /// Roles allowed on a route, using the route pattern (e.g. `/api/items/{id}`).
    #[must_use]
    pub fn allowed_roles(&self, method: &Method, path: &str) -> &'static [Role] {
        self.rules
            .iter()
            .find(|rule| rule.method == *method && rule.path == path)
            .map_or(self.fallback, |rule| rule.roles)
    }
}

/// Middleware resolving the session and enforcing the [`AccessTable`].
///
/// Must be installed with `route_layer` so the matched route pattern is
/// available. On success the request carries a [`SessionContext`].
///
/// A token that fails verification is treated as no token: public routes
/// still proceed as a guest, protected routes answer 401.
pub async fn authorize_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone());
    let path = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_owned(),
        |matched| matched.as_str().to_owned(),
    );
    let allowed = state.access().allowed_roles(request.method(), &path);

    let identity = cookie::session_token(request.headers()).and_then(|token| {
        state
            .tokens()
            .verify(&token)
            .map_err(|e| log_rejected_token(e, &path))
            .ok()
    });

    if let Err(denied) = authorize(identity.as_ref(), allowed) {
        tracing::info!(path = %path, reason = %denied, "Access denied");
        return AppError::from(denied).into_response();
    }

    let context = match identity {
        Some(identity) => {
            set_sentry_user(&identity.user_id, Some(identity.subject.as_str()));
            SessionContext::authenticated(identity, request_id)
        }
        None => SessionContext::guest(request_id),
    };
    request.extensions_mut().insert(context);

    next.run(request).await
}

fn log_rejected_token(error: TokenError, path: &str) {
    match error {
        TokenError::Expired => {
            tracing::debug!(reason = error.reason(), path, "Session token rejected");
        }
        TokenError::Malformed | TokenError::BadSignature => {
            tracing::warn!(reason = error.reason(), path, "Session token rejected");
        }
    }
}
