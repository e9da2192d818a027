//! Bid Gallery Core - Shared domain types.
//!
//! This crate provides the types shared by every Bid Gallery component:
//! - `gallery` - The marketplace HTTP service (bids, checkout, sessions)
//! - `cli` - Command-line tools for migrations and provisioning
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is opt-in through the `postgres`
//! feature so the types stay usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, roles, order statuses and money amounts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
