//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error bodies are JSON: `{"success": false, "error": "...", "code": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AccessDenied;
use crate::db::RepositoryError;
use crate::services::accounts::AuthError;
use crate::services::bid::BidError;
use crate::services::checkout::CheckoutError;
use crate::services::identity::IdentityError;

/// Application-level error type for the gallery service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Registration or login failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The caller may not use this route.
    #[error("Access denied: {0}")]
    Access(#[from] AccessDenied),

    /// A bid could not be evaluated.
    #[error("Bid error: {0}")]
    Bid(#[from] BidError),

    /// Order placement failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A bid was evaluated and not accepted.
    #[error("{0}")]
    BidRejected(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
}

impl AppError {
    /// Whether this is our fault rather than the caller's.
    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Bid(BidError::Persistence(_))
                | Self::Checkout(CheckoutError::Persistence(_))
                | Self::Auth(
                    AuthError::Repository(_)
                        | AuthError::PasswordHash
                        | AuthError::ExternalToken(IdentityError::Unavailable(_))
                )
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::ExternalToken(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_)
                | AuthError::MissingCredentials
                | AuthError::WeakPassword(_)
                | AuthError::InvalidRole(_)
                | AuthError::RoleNotAllowed(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Access(AccessDenied::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Self::Access(AccessDenied::Forbidden) => StatusCode::FORBIDDEN,
            Self::Bid(BidError::InvalidInput(_)) | Self::BidRejected(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Bid(BidError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Checkout(err) => match err {
                CheckoutError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                CheckoutError::PaymentRejected => StatusCode::PAYMENT_REQUIRED,
                CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::ProductAlreadySold(_) => StatusCode::CONFLICT,
                CheckoutError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Stable machine-readable error code.
    fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::MissingCredentials => "missing_credentials",
                AuthError::UserAlreadyExists => "user_already_exists",
                AuthError::InvalidEmail(_) => "invalid_email",
                AuthError::WeakPassword(_) => "weak_password",
                AuthError::InvalidRole(_) | AuthError::RoleNotAllowed(_) => "invalid_role",
                AuthError::ExternalToken(IdentityError::Unavailable(_)) => "identity_unavailable",
                AuthError::ExternalToken(_) => "invalid_external_token",
                AuthError::Repository(_) | AuthError::PasswordHash => "internal",
            },
            Self::Access(AccessDenied::Unauthenticated) => "unauthenticated",
            Self::Access(AccessDenied::Forbidden) => "forbidden",
            Self::Bid(BidError::InvalidInput(_)) => "invalid_input",
            Self::Bid(BidError::Persistence(_)) => "internal",
            Self::BidRejected(_) => "bid_rejected",
            Self::Checkout(err) => match err {
                CheckoutError::Persistence(_) => "internal",
                other => other.reason(),
            },
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Bid(BidError::Persistence(_)) => {
                "Internal server error".to_string()
            }
            Self::Checkout(CheckoutError::Persistence(_)) => {
                "Server error while placing order".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::MissingCredentials => "Email and password are required".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::InvalidRole(_) | AuthError::RoleNotAllowed(_) => {
                    "Role must be CUSTOMER or ARTIST".to_string()
                }
                AuthError::ExternalToken(IdentityError::Unavailable(_)) => {
                    "Identity provider unavailable".to_string()
                }
                AuthError::ExternalToken(_) => "Invalid identity token".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Access(denied) => denied.to_string(),
            Self::Bid(BidError::InvalidInput(msg))
            | Self::BidRejected(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::Checkout(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            code: self.code(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bid_gallery_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_checkout_status_codes() {
        assert_eq!(
            get_status(CheckoutError::InvalidRequest("x".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::PaymentRejected.into()),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(CheckoutError::ProductNotFound(ProductId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::ProductAlreadySold(ProductId::new(1)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Persistence(RepositoryError::NotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_access_and_auth_status_codes() {
        assert_eq!(
            get_status(AccessDenied::Unauthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(AccessDenied::Forbidden.into()), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::MissingCredentials.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body_hides_internals() {
        let err = AppError::from(CheckoutError::Persistence(RepositoryError::DataCorruption(
            "orders.status".to_string(),
        )));
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Server error while placing order");
        assert_eq!(body["code"], "internal");
    }
}
