//! Shipping addresses and their deduplication key.

use serde::Serialize;

use bid_gallery_core::{AddressId, UserId};

/// A sanitised shipping address as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub postal_code: String,
    pub city: String,
    pub line1: String,
    pub line2: Option<String>,
}

impl ShippingAddress {
    /// The fields two addresses must share to be considered the same place.
    #[must_use]
    pub fn key(&self) -> AddressKey<'_> {
        AddressKey {
            line1: &self.line1,
            city: &self.city,
            postal_code: &self.postal_code,
        }
    }
}

/// Deduplication key: `(line1, city, postal_code)`, compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressKey<'a> {
    pub line1: &'a str,
    pub city: &'a str,
    pub postal_code: &'a str,
}

/// A stored address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedAddress {
    pub id: AddressId,
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub address: ShippingAddress,
}

impl ManagedAddress {
    #[must_use]
    pub fn matches(&self, key: &AddressKey<'_>) -> bool {
        self.address.key() == *key
    }
}
