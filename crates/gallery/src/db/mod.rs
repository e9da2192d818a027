//! Persistence for the marketplace.
//!
//! # Schema: `gallery`
//!
//! ## Tables
//!
//! - `users` - Accounts, their role and (for local accounts) password hash
//! - `products` - Artworks with reserve price and sold flag
//! - `addresses` - Shipping addresses, optionally owned by a user
//! - `orders` - Placed orders
//! - `order_items` - One row per purchased product
//!
//! Handlers and services never see a concrete database. They talk to a
//! [`GalleryStore`], and everything a checkout writes goes through a single
//! [`CheckoutUnit`] that is either committed as a whole or dropped.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/gallery/migrations/` and run via:
//! ```bash
//! cargo run -p bid-gallery-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use bid_gallery_core::{Email, ProductId, UserId};

use crate::models::{
    AddressKey, ManagedAddress, NewOrder, NewProduct, NewUser, Order, Product, ShippingAddress,
    User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Read access and account/catalog writes outside of checkout.
#[async_trait]
pub trait GalleryStore: Send + Sync {
    /// Cheap round-trip used by the readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// The account together with its password hash, if it has one.
    async fn user_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Most recently stored address owned by `user_id`.
    async fn latest_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<ManagedAddress>, RepositoryError>;

    /// Open an atomic unit for one checkout.
    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>, RepositoryError>;
}

/// The atomic unit spanning address resolution, product sold-marking and
/// order insertion.
///
/// Nothing written through a unit is visible to other callers until
/// [`CheckoutUnit::commit`] succeeds. Dropping a unit without committing
/// discards all of its writes.
#[async_trait]
pub trait CheckoutUnit: Send {
    /// First stored address with the given key.
    ///
    /// With an owner, only that owner's addresses match. Without one, any
    /// stored address matches.
    async fn find_address(
        &mut self,
        owner: Option<UserId>,
        key: &AddressKey<'_>,
    ) -> Result<Option<ManagedAddress>, RepositoryError>;

    async fn insert_address(
        &mut self,
        owner: Option<UserId>,
        address: &ShippingAddress,
    ) -> Result<ManagedAddress, RepositoryError>;

    /// Read a product and hold it against concurrent checkouts until the
    /// unit ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Flip the sold flag. Returns `false` if the product was already sold.
    async fn mark_sold(&mut self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
