//! Federated identity verification.
//!
//! A federated sign-in hands us an identity token minted by an external
//! provider. The provider's token-info endpoint tells us whether the token
//! is genuine and which email it was issued for.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use bid_gallery_core::{Email, EmailError};

use crate::config::IdentityConfig;

/// Errors from federated token verification.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider did not vouch for the token.
    #[error("identity token rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The token's email claim is not a usable address.
    #[error("identity token carries an invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Turns an external identity token into a verified email.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` for invalid, expired or foreign
    /// tokens and `IdentityError::Unavailable` if the provider is down.
    async fn verify(&self, id_token: &str) -> Result<Email, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    email: Option<String>,
    aud: Option<String>,
    /// Providers send either a JSON bool or the string `"true"`.
    email_verified: Option<Value>,
}

impl TokenInfo {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            None => true,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(_) => false,
        }
    }
}

/// [`IdentityVerifier`] backed by a token-info HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    verify_url: Url,
    audience: Option<String>,
}

impl HttpIdentityVerifier {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &IdentityConfig) -> Self {
        Self {
            client,
            verify_url: config.verify_url.clone(),
            audience: config.audience.clone(),
        }
    }

    fn check(&self, info: TokenInfo) -> Result<Email, IdentityError> {
        if let Some(expected) = &self.audience
            && info.aud.as_deref() != Some(expected.as_str())
        {
            return Err(IdentityError::Rejected("audience mismatch".to_owned()));
        }
        if !info.email_verified() {
            return Err(IdentityError::Rejected("email not verified".to_owned()));
        }
        let email = info
            .email
            .ok_or_else(|| IdentityError::Rejected("token has no email".to_owned()))?;
        Ok(Email::parse(&email)?)
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<Email, IdentityError> {
        let mut url = self.verify_url.clone();
        url.query_pairs_mut().append_pair("id_token", id_token);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(IdentityError::Rejected(format!("provider returned {status}")));
        }

        let info = response
            .json::<TokenInfo>()
            .await
            .map_err(|e| IdentityError::Rejected(format!("unreadable token info: {e}")))?;
        self.check(info)
    }
}
