//! Payment authorization.
//!
//! The [`PaymentGate`] is the first checkout step with an external
//! dependency. It turns every outcome of the authorization call into a
//! boolean so checkout can fail closed with a single policy, while keeping
//! "rejected" and "unreachable" apart in the logs.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::PaymentConfig;

/// Errors talking to the payment collaborator.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a server error.
    #[error("payment service returned {0}")]
    Status(u16),
}

/// External service that authorizes a payment reference.
#[async_trait]
pub trait PaymentAuthorizer: Send + Sync {
    /// `Ok(true)` if the reference is authorized, `Ok(false)` if the
    /// collaborator declined it.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the collaborator could not give an answer.
    async fn authorize(&self, payment_reference: &str) -> Result<bool, PaymentError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest<'a> {
    payment_token: &'a str,
}

#[derive(Deserialize)]
struct AuthorizeResponse {
    success: Option<bool>,
}

/// [`PaymentAuthorizer`] calling an HTTP endpoint.
///
/// Sends `POST {"paymentToken": "..."}` and expects `200 {"success": true}`.
#[derive(Debug, Clone)]
pub struct HttpPaymentAuthorizer {
    client: reqwest::Client,
    url: Url,
}

impl HttpPaymentAuthorizer {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.validation_url.clone(),
        })
    }
}

#[async_trait]
impl PaymentAuthorizer for HttpPaymentAuthorizer {
    async fn authorize(&self, payment_reference: &str) -> Result<bool, PaymentError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&AuthorizeRequest {
                payment_token: payment_reference,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Status(status.as_u16()));
        }
        if status != StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "Payment service declined");
            return Ok(false);
        }

        // An unreadable body or missing field is a decline.
        let body = response.json::<AuthorizeResponse>().await.ok();
        Ok(body.and_then(|b| b.success).unwrap_or(false))
    }
}

/// Validates payment references before any checkout state changes.
#[derive(Clone)]
pub struct PaymentGate {
    authorizer: Arc<dyn PaymentAuthorizer>,
}

impl PaymentGate {
    #[must_use]
    pub fn new(authorizer: Arc<dyn PaymentAuthorizer>) -> Self {
        Self { authorizer }
    }

    /// Whether the payment reference is authorized.
    ///
    /// Declines, timeouts and transport errors all return `false`.
    pub async fn validate(&self, payment_reference: &str) -> bool {
        match self.authorizer.authorize(payment_reference).await {
            Ok(true) => {
                tracing::info!("Payment validated");
                true
            }
            Ok(false) => {
                tracing::warn!(outcome = "rejected", "Payment validation failed");
                false
            }
            Err(e) => {
                tracing::error!(outcome = "unreachable", error = %e, "Payment service unavailable");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Fixed(Result<bool, u16>);

    #[async_trait]
    impl PaymentAuthorizer for Fixed {
        async fn authorize(&self, _payment_reference: &str) -> Result<bool, PaymentError> {
            self.0.map_err(PaymentError::Status)
        }
    }

    #[tokio::test]
    async fn test_validate_maps_outcomes_to_bool() {
        assert!(PaymentGate::new(Arc::new(Fixed(Ok(true)))).validate("pi_1").await);
        assert!(!PaymentGate::new(Arc::new(Fixed(Ok(false)))).validate("pi_1").await);
        assert!(!PaymentGate::new(Arc::new(Fixed(Err(503)))).validate("pi_1").await);
    }
}
