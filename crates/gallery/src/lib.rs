//! Bid Gallery server library.
//!
//! Sessions, role-gated access, sealed bids and transactional checkout for
//! the gallery marketplace. Exposed as a library so the binary, the CLI and
//! the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sanitize;
pub mod services;
pub mod state;
