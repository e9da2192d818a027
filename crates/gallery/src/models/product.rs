//! Artwork listings.

use bid_gallery_core::{Money, ProductId, UserId};

/// A single-unit artwork.
///
/// `reserve_price` is the minimum bid the artist accepts and must never be
/// sent to a client, so this type has no `Serialize` impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub reserve_price: Money,
    pub sold: bool,
    pub artist_id: Option<UserId>,
}

/// Listing to be created by catalog tooling.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub reserve_price: Money,
    pub artist_id: Option<UserId>,
}
