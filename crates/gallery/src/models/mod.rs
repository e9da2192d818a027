//! Domain models.
//!
//! These types represent validated domain objects separate from database row types.

pub mod address;
pub mod order;
pub mod product;
pub mod user;

pub use address::{AddressKey, ManagedAddress, ShippingAddress};
pub use order::{CartLine, NewOrder, NewOrderItem, Order, OrderItem};
pub use product::{NewProduct, Product};
pub use user::{NewUser, User};
