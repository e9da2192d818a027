//! Integration tests for Bid Gallery.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bid-gallery-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth_flow` - Registration, login, logout and role-gated routes
//! - `bidding` - Bids against the hidden reserve
//! - `checkout` - Order placement against the payment provider
//!
//! Every [`TestContext`] serves the real router on `127.0.0.1:0` with the
//! real HTTP payment and identity clients. Those clients talk to stub
//! providers started alongside it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use bid_gallery_core::Money;
use bid_gallery_server::auth::TokenCodec;
use bid_gallery_server::config::{CookieConfig, IdentityConfig, PaymentConfig};
use bid_gallery_server::db::MemoryStore;
use bid_gallery_server::models::Product;
use bid_gallery_server::routes::router;
use bid_gallery_server::services::{HttpIdentityVerifier, HttpPaymentAuthorizer, PaymentGate};
use bid_gallery_server::state::AppState;

/// Payment reference the stub provider approves.
pub const PAYMENT_OK: &str = "pi_ok";
/// Payment reference the stub provider declines.
pub const PAYMENT_DECLINED: &str = "pi_declined";
/// Payment reference the stub provider fails on.
pub const PAYMENT_CRASH: &str = "pi_crash";

const AUDIENCE: &str = "bid-gallery";

/// A running gallery service plus the store behind it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub store: MemoryStore,
}

impl TestContext {
    /// Start the service and both stub providers.
    pub async fn new() -> Self {
        let payments_addr = serve(payment_provider()).await;
        let identity_addr = serve(identity_provider()).await;

        let payment = PaymentConfig {
            validation_url: Url::parse(&format!("http://{payments_addr}/validate"))
                .expect("valid payment url"),
            timeout: Duration::from_secs(5),
        };
        let identity = IdentityConfig {
            verify_url: Url::parse(&format!("http://{identity_addr}/tokeninfo"))
                .expect("valid identity url"),
            audience: Some(AUDIENCE.to_owned()),
        };

        let store = MemoryStore::new();
        let tokens = TokenCodec::new(&SecretString::from(
            "integration-secret-0123456789abcdef-0123456789abcdef",
        ))
        .expect("token secret");
        let state = AppState::new(
            Arc::new(store.clone()),
            tokens,
            CookieConfig::default(),
            PaymentGate::new(Arc::new(
                HttpPaymentAuthorizer::new(&payment).expect("payment client"),
            )),
            Arc::new(HttpIdentityVerifier::new(Client::new(), &identity)),
        );

        let addr = serve(router(state)).await;

        Self {
            client: new_client(),
            base_url: format!("http://{addr}"),
            store,
        }
    }

    /// A fresh client with its own cookie jar, for a second visitor.
    #[must_use]
    pub fn visitor(&self) -> Client {
        new_client()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// List an artwork with a whole-unit reserve price.
    pub async fn product(&self, title: &str, reserve: i64) -> Product {
        self.store
            .seed_product(title, Money::new(Decimal::new(reserve, 0)))
            .await
            .expect("seed product")
    }

    /// POST `body` as JSON with the context's own client.
    pub async fn post(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        post_json(&self.client, &self.url(path), body).await
    }

    /// GET `path` with the context's own client.
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("request failed");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

/// POST `body` as JSON and decode the JSON answer.
pub async fn post_json(client: &Client, url: &str, body: &Value) -> (reqwest::StatusCode, Value) {
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

/// A complete shipping address in the client's wire shape.
#[must_use]
pub fn address(line1: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "mobileNr": "+44 20 7946 0000",
        "country": "United Kingdom",
        "postalCode": "W1 1AA",
        "city": "London",
        "address1": line1,
    })
}

fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    payment_token: String,
}

fn payment_provider() -> Router {
    Router::new().route(
        "/validate",
        post(|Json(req): Json<ValidateRequest>| async move {
            match req.payment_token.as_str() {
                PAYMENT_OK => Json(json!({"success": true})).into_response(),
                PAYMENT_CRASH => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                _ => Json(json!({"success": false})).into_response(),
            }
        }),
    )
}

#[derive(Deserialize)]
struct TokenQuery {
    id_token: String,
}

fn identity_provider() -> Router {
    Router::new().route(
        "/tokeninfo",
        get(|Query(query): Query<TokenQuery>| async move {
            match query.id_token.strip_prefix("good:") {
                Some(email) => Json(json!({
                    "email": email,
                    "aud": AUDIENCE,
                    "email_verified": "true",
                }))
                .into_response(),
                None => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_token"})),
                )
                    .into_response(),
            }
        }),
    )
}
