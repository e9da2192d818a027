//! Per-request session context.

use axum::{extract::FromRequestParts, http::request::Parts};

use bid_gallery_core::UserId;

use super::Identity;
use crate::middleware::RequestId;

/// Identity resolved for one in-flight request.
///
/// Created fresh by the authorization gate for every request and stored in
/// the request extensions. Never shared between requests.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(session: SessionContext) -> impl IntoResponse {
///     match session.identity() {
///         Some(identity) => format!("Hello, {}!", identity.subject),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    identity: Option<Identity>,
    request_id: String,
}

impl SessionContext {
    #[must_use]
    pub fn guest(request_id: impl Into<String>) -> Self {
        Self {
            identity: None,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn authenticated(identity: Identity, request_id: impl Into<String>) -> Self {
        Self {
            identity: Some(identity),
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The user an order or address should be attributed to; `None` for guests.
    #[must_use]
    pub fn placing_user(&self) -> Option<UserId> {
        self.identity.as_ref().map(|identity| identity.user_id)
    }
}

/// Falls back to a guest context when the gate did not run (e.g. in
/// handler unit tests), so extraction never fails.
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<Self>() {
            return Ok(context.clone());
        }

        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map_or_else(String::new, |id| id.0.clone());
        Ok(Self::guest(request_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use bid_gallery_core::{Email, Role};

    use super::*;

    #[test]
    fn test_placing_user() {
        assert_eq!(SessionContext::guest("r-1").placing_user(), None);

        let identity = Identity {
            user_id: UserId::new(3),
            subject: Email::parse("artist@example.com").unwrap(),
            role: Role::Artist,
        };
        let context = SessionContext::authenticated(identity, "r-2");
        assert_eq!(context.placing_user(), Some(UserId::new(3)));
        assert_eq!(context.request_id(), "r-2");
    }

    #[tokio::test]
    async fn test_extractor_defaults_to_guest() {
        let (mut parts, ()) = Request::builder()
            .uri("/")
            .extension(RequestId("req-9".to_owned()))
            .body(())
            .unwrap()
            .into_parts();

        let context = SessionContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(context, SessionContext::guest("req-9"));
    }
}
