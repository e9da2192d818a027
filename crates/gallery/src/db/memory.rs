//! In-process store used by tests and local demos.
//!
//! A checkout unit takes the store-wide lock for its whole lifetime and
//! works on a staged copy of the tables. Commit swaps the copy in; dropping
//! the unit discards it. Concurrent checkouts are therefore serialized, the
//! same guarantee the row lock gives in `PostgreSQL`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use bid_gallery_core::{AddressId, Email, OrderId, OrderItemId, ProductId, UserId};

use super::{CheckoutUnit, GalleryStore, RepositoryError};
use crate::models::{
    AddressKey, ManagedAddress, NewOrder, NewProduct, NewUser, Order, OrderItem, Product,
    ShippingAddress, User,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, (User, Option<String>)>,
    products: BTreeMap<ProductId, Product>,
    addresses: BTreeMap<AddressId, ManagedAddress>,
    orders: BTreeMap<OrderId, Order>,
    last_id: i32,
}

impl Tables {
    /// Ids are drawn from one sequence; they only need to be unique per table.
    fn next_id(&mut self) -> Result<i32, RepositoryError> {
        self.last_id = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| RepositoryError::Conflict("id sequence exhausted".to_owned()))?;
        Ok(self.last_id)
    }

    fn insert_product(&mut self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let product = Product {
            id: ProductId::new(self.next_id()?),
            title: new.title.clone(),
            reserve_price: new.reserve_price,
            sold: false,
            artist_id: new.artist_id,
        };
        self.products.insert(product.id, product.clone());
        Ok(product)
    }
}

/// Thread-safe in-memory [`GalleryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product directly, bypassing catalog tooling.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if ids are exhausted.
    pub async fn seed_product(
        &self,
        title: &str,
        reserve_price: bid_gallery_core::Money,
    ) -> Result<Product, RepositoryError> {
        self.tables.lock().await.insert_product(&NewProduct {
            title: title.to_owned(),
            reserve_price,
            artist_id: None,
        })
    }

    /// Every committed order, oldest first.
    pub async fn orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.values().cloned().collect()
    }

    /// Every committed address, oldest first.
    pub async fn addresses(&self) -> Vec<ManagedAddress> {
        self.tables.lock().await.addresses.values().cloned().collect()
    }
}

#[async_trait]
impl GalleryStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        self.tables.lock().await.insert_product(product)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| &user.email == email)
            .map(|(user, _)| user.clone()))
    }

    async fn user_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find_map(|(user, hash)| {
            (&user.email == email)
                .then(|| hash.clone().map(|h| (user.clone(), h)))
                .flatten()
        }))
    }

    async fn create_user(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|(user, _)| user.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let user = User {
            id: UserId::new(tables.next_id()?),
            email: new.email.clone(),
            role: new.role,
            created_at: Utc::now(),
        };
        tables
            .users
            .insert(user.id, (user.clone(), new.password_hash.clone()));
        Ok(user)
    }

    async fn latest_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<ManagedAddress>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .addresses
            .values()
            .rev()
            .find(|address| address.user_id == Some(user_id))
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>, RepositoryError> {
        let committed = Arc::clone(&self.tables).lock_owned().await;
        let staged = committed.clone();
        Ok(Box::new(MemoryCheckoutUnit { committed, staged }))
    }
}

struct MemoryCheckoutUnit {
    committed: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl CheckoutUnit for MemoryCheckoutUnit {
    async fn find_address(
        &mut self,
        owner: Option<UserId>,
        key: &AddressKey<'_>,
    ) -> Result<Option<ManagedAddress>, RepositoryError> {
        Ok(self
            .staged
            .addresses
            .values()
            .filter(|address| owner.is_none() || address.user_id == owner)
            .find(|address| address.matches(key))
            .cloned())
    }

    async fn insert_address(
        &mut self,
        owner: Option<UserId>,
        address: &ShippingAddress,
    ) -> Result<ManagedAddress, RepositoryError> {
        let managed = ManagedAddress {
            id: AddressId::new(self.staged.next_id()?),
            user_id: owner,
            address: address.clone(),
        };
        self.staged.addresses.insert(managed.id, managed.clone());
        Ok(managed)
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn mark_sold(&mut self, id: ProductId) -> Result<bool, RepositoryError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if product.sold {
            return Ok(false);
        }
        product.sold = true;
        Ok(true)
    }

    async fn insert_order(&mut self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let order_id = OrderId::new(self.staged.next_id()?);
        let mut items = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let already_ordered = self
                .staged
                .orders
                .values()
                .flat_map(|order| &order.items)
                .chain(&items)
                .any(|existing: &OrderItem| existing.product_id == item.product_id);
            if already_ordered {
                return Err(RepositoryError::Conflict(
                    "order item for product already exists".to_owned(),
                ));
            }

            items.push(OrderItem {
                id: OrderItemId::new(self.staged.next_id()?),
                order_id,
                product_id: item.product_id,
                price_at_purchase: item.price_at_purchase,
            });
        }

        let order = Order {
            id: order_id,
            user_id: new.user_id,
            address_id: new.address_id,
            status: new.status,
            placed_at: Utc::now(),
            items,
        };
        self.staged.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self {
            mut committed,
            staged,
        } = *self;
        *committed = staged;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bid_gallery_core::{Money, OrderStatus, Role};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::NewOrderItem;

    fn address(line1: &str) -> ShippingAddress {
        ShippingAddress {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: "ada@example.com".to_owned(),
            phone: "+4512345678".to_owned(),
            country: "Denmark".to_owned(),
            postal_code: "2100".to_owned(),
            city: "Copenhagen".to_owned(),
            line1: line1.to_owned(),
            line2: None,
        }
    }

    #[tokio::test]
    async fn test_dropped_unit_leaves_no_trace() {
        let store = MemoryStore::new();
        let product = store
            .seed_product("Dusk", Money::new(Decimal::new(500, 0)))
            .await
            .unwrap();

        {
            let mut unit = store.begin().await.unwrap();
            unit.insert_address(None, &address("Main St 1")).await.unwrap();
            assert!(unit.mark_sold(product.id).await.unwrap());
        }

        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
        assert!(store.addresses().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let product = store
            .seed_product("Dawn", Money::new(Decimal::new(500, 0)))
            .await
            .unwrap();

        let mut unit = store.begin().await.unwrap();
        let managed = unit.insert_address(None, &address("Main St 1")).await.unwrap();
        assert!(unit.mark_sold(product.id).await.unwrap());
        let order = unit
            .insert_order(&NewOrder {
                user_id: None,
                address_id: managed.id,
                status: OrderStatus::Paid,
                items: vec![NewOrderItem {
                    product_id: product.id,
                    price_at_purchase: Money::new(Decimal::new(600, 0)),
                }],
            })
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert!(store.product(product.id).await.unwrap().unwrap().sold);
        assert_eq!(store.orders().await, vec![order]);
    }

    #[tokio::test]
    async fn test_mark_sold_is_one_way() {
        let store = MemoryStore::new();
        let product = store.seed_product("Noon", Money::ZERO).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert!(unit.mark_sold(product.id).await.unwrap());
        assert!(!unit.mark_sold(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_address_scoping() {
        let store = MemoryStore::new();
        let owner = store
            .create_user(&NewUser {
                email: Email::parse("owner@example.com").unwrap(),
                role: Role::Customer,
                password_hash: None,
            })
            .await
            .unwrap();

        let mut unit = store.begin().await.unwrap();
        let owned = unit
            .insert_address(Some(owner.id), &address("Harbour 2"))
            .await
            .unwrap();
        let key_source = address("Harbour 2");
        let key = key_source.key();

        assert_eq!(unit.find_address(None, &key).await.unwrap(), Some(owned.clone()));
        assert_eq!(
            unit.find_address(Some(owner.id), &key).await.unwrap(),
            Some(owned)
        );
        assert_eq!(
            unit.find_address(Some(UserId::new(999)), &key).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let new = NewUser {
            email: Email::parse("dup@example.com").unwrap(),
            role: Role::Artist,
            password_hash: Some("hash".to_owned()),
        };
        store.create_user(&new).await.unwrap();

        assert!(matches!(
            store.create_user(&new).await,
            Err(RepositoryError::Conflict(_))
        ));
        let (user, hash) = store
            .user_with_password(&new.email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::Artist);
        assert_eq!(hash, "hash");
    }
}
