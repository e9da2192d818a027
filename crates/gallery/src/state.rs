//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{AccessTable, TokenCodec};
use crate::config::{CookieConfig, GalleryConfig};
use crate::db::GalleryStore;
use crate::services::{
    AuthService, BidEngine, CheckoutOrchestrator, HttpIdentityVerifier, HttpPaymentAuthorizer,
    IdentityVerifier, PaymentError, PaymentGate,
};

/// Error assembling the application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid token secret: {0}")]
    TokenSecret(#[from] hmac::digest::InvalidLength),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("identity client: {0}")]
    Identity(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Services are built per call
/// from the shared parts and borrow them.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn GalleryStore>,
    tokens: TokenCodec,
    cookie: CookieConfig,
    access: AccessTable,
    payments: PaymentGate,
    identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Create a new application state from its collaborators.
    ///
    /// The route access table is always the one declared in [`crate::routes`].
    #[must_use]
    pub fn new(
        store: Arc<dyn GalleryStore>,
        tokens: TokenCodec,
        cookie: CookieConfig,
        payments: PaymentGate,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                tokens,
                cookie,
                access: crate::routes::access_table(),
                payments,
                identity,
            }),
        }
    }

    /// Create the production state: HTTP collaborators built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token secret is unusable or an HTTP client
    /// cannot be built.
    pub fn from_config(
        config: &GalleryConfig,
        store: Arc<dyn GalleryStore>,
    ) -> Result<Self, StateError> {
        let tokens = TokenCodec::new(&config.token_secret)?;
        let payments = PaymentGate::new(Arc::new(HttpPaymentAuthorizer::new(&config.payment)?));
        let identity_client = reqwest::Client::builder()
            .timeout(config.payment.timeout)
            .build()?;
        let identity = HttpIdentityVerifier::new(identity_client, &config.identity);

        Ok(Self::new(
            store,
            tokens,
            config.cookie,
            payments,
            Arc::new(identity),
        ))
    }

    #[must_use]
    pub fn store(&self) -> &dyn GalleryStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.inner.tokens
    }

    #[must_use]
    pub fn cookie_config(&self) -> CookieConfig {
        self.inner.cookie
    }

    #[must_use]
    pub fn access(&self) -> &AccessTable {
        &self.inner.access
    }

    #[must_use]
    pub fn identity_verifier(&self) -> &dyn IdentityVerifier {
        self.inner.identity.as_ref()
    }

    #[must_use]
    pub fn accounts(&self) -> AuthService<'_> {
        AuthService::new(self.store())
    }

    #[must_use]
    pub fn bid_engine(&self) -> BidEngine<'_> {
        BidEngine::new(self.store())
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutOrchestrator<'_> {
        CheckoutOrchestrator::new(self.store(), &self.inner.payments)
    }
}
