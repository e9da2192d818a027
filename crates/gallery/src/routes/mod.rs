//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (store ping)
//!
//! # Auth
//! POST /api/auth/register        - Register and sign in
//! POST /api/auth/login           - Email/password login
//! POST /api/auth/login/firebase  - Federated login
//! POST /api/auth/logout          - Clear the session cookie
//! GET  /api/auth/check           - Current session
//! GET  /api/auth/address         - Caller's latest address (CUSTOMER)
//!
//! # Checkout
//! POST /api/checkout/placebid    - Bid against the reserve price
//! POST /api/checkout/placeorder  - Pay for a cart and place the order
//! ```
//!
//! Access rules for every route live in [`access_table`].

pub mod auth;
pub mod checkout;
pub mod health;

use axum::{
    Router,
    body::Body,
    http::{Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use bid_gallery_core::Role;

use crate::auth::{AccessTable, authorize_request};
use crate::middleware::request_id_middleware;
use crate::state::AppState;

const CUSTOMER_ONLY: &[Role] = &[Role::Customer];

/// Allowed roles per route.
#[must_use]
pub fn access_table() -> AccessTable {
    AccessTable::new()
        .public(Method::GET, "/health")
        .public(Method::GET, "/health/ready")
        .public(Method::POST, "/api/auth/register")
        .public(Method::POST, "/api/auth/login")
        .public(Method::POST, "/api/auth/login/firebase")
        .public(Method::POST, "/api/auth/logout")
        .public(Method::GET, "/api/auth/check")
        .allow(Method::GET, "/api/auth/address", CUSTOMER_ONLY)
        // Guests may bid and check out.
        .public(Method::POST, "/api/checkout/placebid")
        .public(Method::POST, "/api/checkout/placeorder")
}

/// Create the auth routes.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/login/firebase", post(auth::login_federated))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/check", get(auth::check))
        .route("/api/auth/address", get(auth::my_address))
}

/// Create the checkout routes.
fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/api/checkout/placebid", post(checkout::place_bid))
        .route("/api/checkout/placeorder", post(checkout::place_order))
}

/// Create the full application router.
///
/// Layers, outermost first: request tracing span, request id, then the
/// authorization gate on every matched route. Sentry layers are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(auth_routes())
        .merge(checkout_routes())
        .route_layer(from_fn_with_state(state.clone(), authorize_request))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
