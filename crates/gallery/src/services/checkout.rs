//! Order placement.
//!
//! Checkout runs as a fixed sequence of stages. Payment is confirmed before
//! anything is written. Address resolution, sold-marking and the order
//! insert then share a single [`crate::db::CheckoutUnit`]: if any of them fails the
//! unit is dropped uncommitted and none of its writes survive.

use std::fmt;

use thiserror::Error;

use bid_gallery_core::{OrderStatus, ProductId};

use super::address::AddressDeduplicator;
use super::payment::PaymentGate;
use crate::auth::SessionContext;
use crate::db::{GalleryStore, RepositoryError};
use crate::models::{CartLine, NewOrder, NewOrderItem, Order, ShippingAddress};

/// Message returned for an incomplete checkout request.
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid cart, missing address, or payment intent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    Validating,
    PaymentPending,
    AddressResolving,
    ItemsProcessing,
    Persisted,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validating => "validating",
            Self::PaymentPending => "payment_pending",
            Self::AddressResolving => "address_resolving",
            Self::ItemsProcessing => "items_processing",
            Self::Persisted => "persisted",
        })
    }
}

/// A sanitised checkout submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub cart: Vec<CartLine>,
    pub address: Option<ShippingAddress>,
    pub payment_reference: String,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Payment validation failed or expired")]
    PaymentRejected,

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product already sold: {0}")]
    ProductAlreadySold(ProductId),

    #[error("database error: {0}")]
    Persistence(#[from] RepositoryError),
}

impl CheckoutError {
    /// Short label for structured logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PaymentRejected => "payment_rejected",
            Self::ProductNotFound(_) => "product_not_found",
            Self::ProductAlreadySold(_) => "product_already_sold",
            Self::Persistence(_) => "persistence",
        }
    }
}

/// Turns a paid cart into a persisted order.
pub struct CheckoutOrchestrator<'a> {
    store: &'a dyn GalleryStore,
    payments: &'a PaymentGate,
}

impl<'a> CheckoutOrchestrator<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn GalleryStore, payments: &'a PaymentGate) -> Self {
        Self { store, payments }
    }

    /// Place an order for the caller in `session`.
    ///
    /// Each cart line's bid price becomes the item's price at purchase.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the cart is empty, a bid price cannot be stored
    ///   exactly, the address is missing or incomplete, or the payment
    ///   reference is blank
    /// - `PaymentRejected` if payment is not authorized; nothing is written
    /// - `ProductNotFound` / `ProductAlreadySold` for a stale cart line;
    ///   every write of this checkout is rolled back
    /// - `Persistence` if storage fails; every write is rolled back
    pub async fn place_order(
        &self,
        session: &SessionContext,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let result = self.run(session, request).await;
        if let Err(e) = &result {
            tracing::warn!(reason = e.reason(), error = %e, "Checkout failed");
        }
        result
    }

    async fn run(
        &self,
        session: &SessionContext,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        enter(CheckoutStage::Validating);
        let (cart, address, payment_reference) = validate(request)?;

        enter(CheckoutStage::PaymentPending);
        if !self.payments.validate(&payment_reference).await {
            return Err(CheckoutError::PaymentRejected);
        }

        let owner = session.placing_user();
        let mut unit = self.store.begin().await?;

        enter(CheckoutStage::AddressResolving);
        let managed = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address, owner)
            .await?;

        enter(CheckoutStage::ItemsProcessing);
        let mut items = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = unit
                .lock_product(line.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            if product.sold || !unit.mark_sold(product.id).await? {
                return Err(CheckoutError::ProductAlreadySold(product.id));
            }
            items.push(NewOrderItem {
                product_id: product.id,
                price_at_purchase: line.bid_price,
            });
        }

        let order = unit
            .insert_order(&NewOrder {
                user_id: owner,
                address_id: managed.id,
                status: OrderStatus::Paid,
                items,
            })
            .await?;
        unit.commit().await?;

        enter(CheckoutStage::Persisted);
        tracing::info!(
            order_id = %order.id,
            items = order.items.len(),
            guest = owner.is_none(),
            "Order placed"
        );
        Ok(order)
    }
}

fn enter(stage: CheckoutStage) {
    tracing::debug!(%stage, "Checkout stage");
}

fn validate(
    request: CheckoutRequest,
) -> Result<(Vec<CartLine>, ShippingAddress, String), CheckoutError> {
    let invalid = || CheckoutError::InvalidRequest(INVALID_REQUEST_MESSAGE.to_owned());

    let CheckoutRequest {
        cart,
        address,
        payment_reference,
    } = request;

    let address = address.ok_or_else(invalid)?;
    if cart.is_empty() || payment_reference.trim().is_empty() {
        return Err(invalid());
    }

    if cart.iter().any(|line| !line.bid_price.is_storable()) {
        return Err(CheckoutError::InvalidRequest(
            "Bid price must have at most 2 decimal places and 10 integer digits".to_owned(),
        ));
    }

    let key = address.key();
    if [key.line1, key.city, key.postal_code]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(CheckoutError::InvalidRequest(
            "Address line1, city and postal code are required".to_owned(),
        ));
    }

    Ok((cart, address, payment_reference))
}
