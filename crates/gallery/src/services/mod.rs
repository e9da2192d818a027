//! Business logic services.
//!
//! # Services
//!
//! - `accounts` - Registration, password and federated login
//! - `address` - Shipping address deduplication
//! - `bid` - Bids against the hidden reserve price
//! - `checkout` - Order placement
//! - `identity` - Federated identity collaborator
//! - `payment` - Payment authorization collaborator

pub mod accounts;
pub mod address;
pub mod bid;
pub mod checkout;
pub mod identity;
pub mod payment;

pub use accounts::{AuthError, AuthService};
pub use address::AddressDeduplicator;
pub use bid::{Bid, BidDecision, BidEngine, BidError};
pub use checkout::{CheckoutError, CheckoutOrchestrator, CheckoutRequest, CheckoutStage};
pub use identity::{HttpIdentityVerifier, IdentityError, IdentityVerifier};
pub use payment::{HttpPaymentAuthorizer, PaymentAuthorizer, PaymentError, PaymentGate};
