//! Bid and order placement handlers.
//!
//! Payloads are accepted loosely (numbers may arrive as strings, fields may
//! be missing) and cleaned here before they reach the services.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bid_gallery_core::{Money, OrderId};

use crate::auth::SessionContext;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartLine, ShippingAddress};
use crate::sanitize;
use crate::services::bid::{BidDecision, decimal_from_value, parse_bid, product_id_from_value};
use crate::services::checkout::{CheckoutError, CheckoutRequest, INVALID_REQUEST_MESSAGE};
use crate::state::AppState;

/// Bid submission.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPayload {
    pub product_id: Option<Value>,
    pub amount: Option<Value>,
}

/// Checkout submission as sent by the client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub cart: Option<Vec<CartLinePayload>>,
    pub address: Option<AddressPayload>,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLinePayload {
    pub product_id: Option<Value>,
    pub bid_price: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(alias = "mobileNr")]
    pub phone: String,
    pub country: String,
    pub postal_code: String,
    pub city: String,
    #[serde(alias = "address1")]
    pub line1: String,
    #[serde(alias = "address2")]
    pub line2: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub success: bool,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
    pub total: Option<Money>,
    pub request_id: String,
}

impl CartLinePayload {
    fn into_line(self) -> std::result::Result<CartLine, CheckoutError> {
        let product_id = self.product_id.as_ref().and_then(product_id_from_value);
        let bid_price = self.bid_price.as_ref().and_then(decimal_from_value);
        match (product_id, bid_price) {
            (Some(product_id), Some(bid_price)) => Ok(CartLine {
                product_id,
                bid_price: Money::new(bid_price).clamp_non_negative(),
            }),
            _ => Err(CheckoutError::InvalidRequest(
                "Invalid productId or bidPrice in cart".to_owned(),
            )),
        }
    }
}

impl From<AddressPayload> for ShippingAddress {
    fn from(raw: AddressPayload) -> Self {
        Self {
            first_name: sanitize::name(&raw.first_name),
            last_name: sanitize::name(&raw.last_name),
            email: sanitize::email(&raw.email),
            phone: sanitize::phone(&raw.phone),
            country: sanitize::text(&raw.country),
            postal_code: sanitize::postal_code(&raw.postal_code),
            city: sanitize::text(&raw.city),
            line1: sanitize::text(&raw.line1),
            line2: raw
                .line2
                .map(|line| sanitize::text(&line))
                .filter(|line| !line.is_empty()),
        }
    }
}

impl CheckoutPayload {
    /// Clean the payload into a checkout request.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidRequest` for a missing cart or a cart
    /// line that is not numeric.
    pub fn into_request(self) -> std::result::Result<CheckoutRequest, CheckoutError> {
        let cart = self
            .cart
            .ok_or_else(|| CheckoutError::InvalidRequest(INVALID_REQUEST_MESSAGE.to_owned()))?
            .into_iter()
            .map(CartLinePayload::into_line)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CheckoutRequest {
            cart,
            address: self.address.map(ShippingAddress::from),
            payment_reference: self
                .payment_intent_id
                .as_deref()
                .map(sanitize::payment_reference)
                .unwrap_or_default(),
        })
    }
}

/// Place a bid.
///
/// 404 for an unknown product, 400 for a sold product or a bid under the
/// reserve, 200 when accepted. The reserve itself is never disclosed.
pub async fn place_bid(
    State(state): State<AppState>,
    session: SessionContext,
    payload: std::result::Result<Json<BidPayload>, JsonRejection>,
) -> Result<Json<BidResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let bid = parse_bid(payload.product_id.as_ref(), payload.amount.as_ref())?;
    let product_id = bid.product_id;

    match state.bid_engine().evaluate(bid).await? {
        BidDecision::Accepted => Ok(Json(BidResponse {
            success: true,
            message: format!("Bid for product Id: {product_id} is accepted."),
            request_id: session.request_id().to_owned(),
        })),
        BidDecision::NotFound => Err(AppError::NotFound(format!(
            "Product not found with id {product_id}"
        ))),
        BidDecision::AlreadySold => Err(AppError::BidRejected("Product already sold.".to_owned())),
        BidDecision::BelowReserve => {
            Err(AppError::BidRejected("Bid too low. Retry again.".to_owned()))
        }
    }
}

/// Pay for a cart and place the order.
pub async fn place_order(
    State(state): State<AppState>,
    session: SessionContext,
    payload: std::result::Result<Json<CheckoutPayload>, JsonRejection>,
) -> Result<Json<OrderResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let request = payload.into_request()?;

    let order = state.checkout().place_order(&session, request).await?;

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    Ok(Json(OrderResponse {
        success: true,
        message: format!("OrderId {} placed successfully.", order.id),
        order_id: order.id,
        total: order.total(),
        request_id: session.request_id().to_owned(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tower::ServiceExt;

    use bid_gallery_core::{ProductId, Role};

    use super::*;
    use crate::db::{GalleryStore, MemoryStore};
    use crate::routes::router;
    use crate::routes::test_support::{VALID_PAYMENT, body_json, json_request, session_cookie, state};

    fn money(amount: i64) -> Money {
        Money::new(Decimal::new(amount, 0))
    }

    fn address_json() -> Value {
        json!({
            "firstName": "Søren<script>",
            "lastName": "Kierkegaard",
            "email": " SK@Example.DK ",
            "mobileNr": "+45 33 12 00 00",
            "country": "Denmark",
            "postalCode": "DK-1050",
            "city": "København",
            "address1": "Nytorv 2",
            "address2": "   "
        })
    }

    fn payload(value: Value) -> CheckoutPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_into_request_sanitises_address() {
        let request = payload(json!({
            "cart": [{"productId": 1, "bidPrice": 600}],
            "address": address_json(),
            "paymentIntentId": " pi_1<> "
        }))
        .into_request()
        .unwrap();

        let address = request.address.unwrap();
        assert_eq!(address.first_name, "Sørenscript");
        assert_eq!(address.email, "sk@example.dk");
        assert_eq!(address.phone, "+4533120000");
        assert_eq!(address.postal_code, "1050");
        assert_eq!(address.line1, "Nytorv 2");
        assert_eq!(address.line2, None);
        assert_eq!(request.payment_reference, "pi_1");
    }

    #[test]
    fn test_into_request_clamps_negative_bid() {
        let request = payload(json!({
            "cart": [{"productId": "3", "bidPrice": -25.5}],
            "paymentIntentId": "pi"
        }))
        .into_request()
        .unwrap();

        assert_eq!(request.cart, vec![CartLine {
            product_id: ProductId::new(3),
            bid_price: Money::ZERO,
        }]);
        assert_eq!(request.address, None);
    }

    #[test]
    fn test_into_request_rejects_bad_cart() {
        assert!(payload(json!({"paymentIntentId": "pi"})).into_request().is_err());
        assert!(
            payload(json!({"cart": [{"productId": "abc", "bidPrice": 1}]}))
                .into_request()
                .is_err()
        );
        assert!(
            payload(json!({"cart": [{"productId": 1}]}))
                .into_request()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_bid_outcomes() {
        let store = MemoryStore::new();
        let product = store.seed_product("Skagen", money(500)).await.unwrap();
        let id = product.id.as_i32();

        let cases = [
            (json!({"productId": id, "amount": 300}), StatusCode::BAD_REQUEST),
            (json!({"productId": id, "amount": "600"}), StatusCode::OK),
            (json!({"productId": 9999, "amount": 600}), StatusCode::NOT_FOUND),
            (json!({"productId": "x", "amount": 600}), StatusCode::BAD_REQUEST),
        ];

        for (body, expected) in cases {
            let response = router(state(&store))
                .oneshot(json_request("POST", "/api/checkout/placebid", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{body}");
        }
        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
    }

    #[tokio::test]
    async fn test_rejected_bid_does_not_leak_reserve() {
        let store = MemoryStore::new();
        let product = store.seed_product("Skagen", money(500)).await.unwrap();

        let response = router(state(&store))
            .oneshot(json_request(
                "POST",
                "/api/checkout/placebid",
                &json!({"productId": product.id.as_i32(), "amount": 1}),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["code"], "bid_rejected");
        assert!(!body.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_place_order_for_signed_in_customer() {
        let store = MemoryStore::new();
        let product = store.seed_product("Vilhelm", money(500)).await.unwrap();
        let cookie = session_cookie(42, Role::Customer);

        let mut request = json_request(
            "POST",
            "/api/checkout/placeorder",
            &json!({
                "cart": [{"productId": product.id.as_i32(), "bidPrice": 600}],
                "address": address_json(),
                "paymentIntentId": VALID_PAYMENT
            }),
        );
        request
            .headers_mut()
            .insert(axum::http::header::COOKIE, cookie.parse().unwrap());

        let response = router(state(&store)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["total"], "600");

        let orders = store.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders.first().unwrap().user_id.map(|u| u.as_i32()), Some(42));
    }

    #[tokio::test]
    async fn test_place_order_error_statuses() {
        let store = MemoryStore::new();
        let product = store.seed_product("Anna", money(500)).await.unwrap();
        let line = json!([{"productId": product.id.as_i32(), "bidPrice": 600}]);

        let cases = [
            (
                json!({"cart": [], "address": address_json(), "paymentIntentId": VALID_PAYMENT}),
                StatusCode::BAD_REQUEST,
            ),
            (
                json!({"cart": line, "address": address_json(), "paymentIntentId": "pi_bad"}),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                json!({
                    "cart": [{"productId": 9999, "bidPrice": 1}],
                    "address": address_json(),
                    "paymentIntentId": VALID_PAYMENT
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                json!({
                    "cart": [{"productId": product.id.as_i32(), "bidPrice": "123456789012345.6789"}],
                    "address": address_json(),
                    "paymentIntentId": VALID_PAYMENT
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (body, expected) in cases {
            let response = router(state(&store))
                .oneshot(json_request("POST", "/api/checkout/placeorder", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{body}");
        }
        assert!(store.orders().await.is_empty());
        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
    }
}
