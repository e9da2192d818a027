//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. Request ID (add unique ID to each request)
//! 3. `TraceLayer` (request span)
//! 4. Authorization gate (route layer, see [`crate::auth::gate`])

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
