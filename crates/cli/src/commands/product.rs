//! Catalogue commands.
//!
//! # Usage
//!
//! ```bash
//! gallery-cli product create -t "Harbour at Dusk" --reserve 450.00 --artist-id 3
//! ```

use bid_gallery_core::{Money, UserId};
use bid_gallery_server::db::{GalleryStore, PgStore, RepositoryError, create_pool};
use bid_gallery_server::models::NewProduct;
use rust_decimal::Decimal;
use thiserror::Error;

use super::database_url;

/// Errors that can occur while listing an artwork.
#[derive(Debug, Error)]
pub enum ProductError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Title was blank.
    #[error("Title must not be empty")]
    EmptyTitle,

    /// Reserve price was negative.
    #[error("Reserve price must not be negative: {0}")]
    NegativeReserve(Decimal),

    /// Reserve price does not fit the price column.
    #[error("Reserve price must have at most 2 decimal places and 10 integer digits: {0}")]
    ReserveOutOfRange(Decimal),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// List a new artwork for sale.
///
/// # Returns
///
/// The ID of the created product.
///
/// # Errors
///
/// Returns an error if the input is invalid or the database is unreachable.
pub async fn create(
    title: &str,
    reserve: Decimal,
    artist_id: Option<i32>,
) -> Result<i32, ProductError> {
    dotenvy::dotenv().ok();

    let title = title.trim();
    if title.is_empty() {
        return Err(ProductError::EmptyTitle);
    }
    if reserve.is_sign_negative() {
        return Err(ProductError::NegativeReserve(reserve));
    }
    let reserve_price = Money::new(reserve);
    if !reserve_price.is_storable() {
        return Err(ProductError::ReserveOutOfRange(reserve));
    }

    let url = database_url().ok_or(ProductError::MissingEnvVar("GALLERY_DATABASE_URL"))?;

    tracing::info!("Connecting to gallery database...");
    let store = PgStore::new(create_pool(&url).await?);

    let product = store
        .create_product(&NewProduct {
            title: title.to_owned(),
            reserve_price,
            artist_id: artist_id.map(UserId::new),
        })
        .await?;

    tracing::info!(
        "Product listed! ID: {}, Title: {}, Reserve: {}",
        product.id,
        product.title,
        product.reserve_price
    );

    Ok(product.id.as_i32())
}
