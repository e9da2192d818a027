//! Sealed bids against a hidden reserve price.
//!
//! A bid is advisory: accepting it does not reserve or sell the product.
//! The sold flag only changes when an order is placed.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use bid_gallery_core::{Money, ProductId};

use crate::db::{GalleryStore, RepositoryError};

/// Errors that prevent a bid from being evaluated at all.
#[derive(Debug, Error)]
pub enum BidError {
    /// Product id or amount is not numeric.
    #[error("{0}")]
    InvalidInput(String),

    /// The product lookup failed.
    #[error("database error: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Outcome of evaluating a bid. Rejections are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidDecision {
    Accepted,
    BelowReserve,
    AlreadySold,
    NotFound,
}

impl BidDecision {
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Short label for structured logs.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::BelowReserve => "below_reserve",
            Self::AlreadySold => "already_sold",
            Self::NotFound => "not_found",
        }
    }
}

/// A bid whose fields parsed as numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bid {
    pub product_id: ProductId,
    pub amount: Money,
}

/// Parse a bid from loosely typed JSON values.
///
/// Both fields may arrive as JSON numbers or numeric strings.
///
/// # Errors
///
/// Returns `BidError::InvalidInput` if the product id is not a positive
/// integer or the amount is not a decimal number that fits a stored price
/// (two decimal places, ten integer digits).
pub fn parse_bid(product_id: Option<&Value>, amount: Option<&Value>) -> Result<Bid, BidError> {
    let invalid = || BidError::InvalidInput("Invalid productId or bid amount".to_owned());

    let product_id = product_id.and_then(product_id_from_value).ok_or_else(invalid)?;
    let amount = amount
        .and_then(decimal_from_value)
        .map(Money::new)
        .filter(|amount| amount.is_storable())
        .ok_or_else(invalid)?;

    Ok(Bid { product_id, amount })
}

/// A strictly positive integer id, from a JSON number or string.
pub(crate) fn product_id_from_value(value: &Value) -> Option<ProductId> {
    let id = match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }?;
    (id > 0).then(|| ProductId::new(id))
}

/// A decimal amount, from a JSON number or string.
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Evaluates bids against the catalog.
pub struct BidEngine<'a> {
    store: &'a dyn GalleryStore,
}

impl<'a> BidEngine<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn GalleryStore) -> Self {
        Self { store }
    }

    /// Decide a bid. Rules, in order: the product must exist and be unsold,
    /// then the amount must reach the reserve.
    ///
    /// # Errors
    ///
    /// Returns `BidError::Persistence` if the product lookup fails.
    pub async fn evaluate(&self, bid: Bid) -> Result<BidDecision, BidError> {
        let decision = match self.store.product(bid.product_id).await? {
            None => BidDecision::NotFound,
            Some(product) if product.sold => BidDecision::AlreadySold,
            Some(product) => {
                tracing::debug!(
                    product_id = %product.id,
                    reserve = %product.reserve_price,
                    amount = %bid.amount,
                    "Comparing bid with reserve"
                );
                if bid.amount >= product.reserve_price {
                    BidDecision::Accepted
                } else {
                    BidDecision::BelowReserve
                }
            }
        };

        if decision.is_accepted() {
            tracing::info!(product_id = %bid.product_id, "Bid accepted");
        } else {
            tracing::info!(
                product_id = %bid.product_id,
                reason = decision.reason(),
                "Bid rejected"
            );
        }

        Ok(decision)
    }

    /// Whether the bid is accepted; rejections of any kind are `false`.
    ///
    /// # Errors
    ///
    /// Returns `BidError::Persistence` if the product lookup fails.
    pub async fn place_bid(&self, bid: Bid) -> Result<bool, BidError> {
        Ok(self.evaluate(bid).await?.is_accepted())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{CheckoutUnit, MemoryStore};

    fn money(amount: i64) -> Money {
        Money::new(Decimal::new(amount, 0))
    }

    fn bid(product_id: ProductId, amount: i64) -> Bid {
        Bid {
            product_id,
            amount: money(amount),
        }
    }

    async fn sell(store: &MemoryStore, id: ProductId) {
        let mut unit: Box<dyn CheckoutUnit> = store.begin().await.unwrap();
        assert!(unit.mark_sold(id).await.unwrap());
        unit.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_accepts_iff_amount_reaches_reserve() {
        let store = MemoryStore::new();
        let product = store.seed_product("Field", money(500)).await.unwrap();
        let engine = BidEngine::new(&store);

        for (amount, expected) in [(0, false), (499, false), (500, true), (501, true), (10_000, true)] {
            assert_eq!(
                engine.place_bid(bid(product.id, amount)).await.unwrap(),
                expected,
                "bid {amount}"
            );
        }
    }

    #[tokio::test]
    async fn test_fractional_amounts_compare_exactly() {
        let store = MemoryStore::new();
        let product = store
            .seed_product("Shore", Money::new(Decimal::new(50000, 2)))
            .await
            .unwrap();
        let engine = BidEngine::new(&store);

        let just_below = Bid {
            product_id: product.id,
            amount: Money::new(Decimal::new(49999, 2)),
        };
        assert_eq!(engine.evaluate(just_below).await.unwrap(), BidDecision::BelowReserve);
    }

    #[tokio::test]
    async fn test_sold_product_rejects_any_amount() {
        let store = MemoryStore::new();
        let product = store.seed_product("Tide", money(500)).await.unwrap();
        sell(&store, product.id).await;
        let engine = BidEngine::new(&store);

        for amount in [0, 500, 1_000_000] {
            assert_eq!(
                engine.evaluate(bid(product.id, amount)).await.unwrap(),
                BidDecision::AlreadySold
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let store = MemoryStore::new();
        let engine = BidEngine::new(&store);

        assert_eq!(
            engine.evaluate(bid(ProductId::new(404), 600)).await.unwrap(),
            BidDecision::NotFound
        );
        assert!(!engine.place_bid(bid(ProductId::new(404), 600)).await.unwrap());
    }

    #[tokio::test]
    async fn test_low_bid_does_not_consume_product() {
        let store = MemoryStore::new();
        let product = store.seed_product("Orchard", money(500)).await.unwrap();
        let engine = BidEngine::new(&store);

        assert!(!engine.place_bid(bid(product.id, 300)).await.unwrap());
        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
        assert!(engine.place_bid(bid(product.id, 600)).await.unwrap());
        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
    }

    #[test]
    fn test_parse_bid_accepts_numbers_and_strings() {
        let parsed = parse_bid(Some(&json!(1)), Some(&json!(600))).unwrap();
        assert_eq!(parsed, bid(ProductId::new(1), 600));

        let parsed = parse_bid(Some(&json!(" 2 ")), Some(&json!("600.50"))).unwrap();
        assert_eq!(parsed.product_id, ProductId::new(2));
        assert_eq!(parsed.amount, Money::new(Decimal::new(60050, 2)));

        let parsed = parse_bid(Some(&json!(3)), Some(&json!(12.5))).unwrap();
        assert_eq!(parsed.amount, Money::new(Decimal::new(125, 1)));

        let parsed = parse_bid(Some(&json!(4)), Some(&json!("9999999999.99"))).unwrap();
        assert_eq!(parsed.amount, Money::new(Decimal::new(999_999_999_999, 2)));
    }

    #[test]
    fn test_parse_bid_rejects_malformed_input() {
        let cases = [
            (None, Some(json!(600))),
            (Some(json!(1)), None),
            (Some(json!("one")), Some(json!(600))),
            (Some(json!(1.5)), Some(json!(600))),
            (Some(json!(0)), Some(json!(600))),
            (Some(json!(-4)), Some(json!(600))),
            (Some(json!(1)), Some(json!("lots"))),
            (Some(json!(1)), Some(json!(null))),
            (Some(json!([1])), Some(json!(600))),
            (Some(json!(1)), Some(json!("600.505"))),
            (Some(json!(1)), Some(json!("10000000000"))),
            (Some(json!(1)), Some(json!("123456789012345.6789"))),
        ];

        for (product_id, amount) in cases {
            assert!(
                matches!(
                    parse_bid(product_id.as_ref(), amount.as_ref()),
                    Err(BidError::InvalidInput(_))
                ),
                "{product_id:?} / {amount:?}"
            );
        }
    }
}
