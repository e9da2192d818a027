//! Orders and their line items.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bid_gallery_core::{AddressId, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// One validated cart entry: the product and the bid the buyer is paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub bid_price: Money,
}

/// A persisted order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Sum of all prices at purchase, `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.price_at_purchase))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price_at_purchase: Money,
}

/// Order aggregate assembled during checkout, written in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub price_at_purchase: Money,
}
