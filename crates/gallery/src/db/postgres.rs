//! `PostgreSQL` implementation of the store traits.
//!
//! Queries are built at runtime with `sqlx::query_as` into internal row
//! types, then converted into domain models with `TryFrom`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use bid_gallery_core::{
    AddressId, Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, Role, UserId,
};

use super::{CheckoutUnit, GalleryStore, RepositoryError, conflict_on_unique};
use crate::models::{
    AddressKey, ManagedAddress, NewOrder, NewProduct, NewUser, Order, OrderItem, Product,
    ShippingAddress, User,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            role: row.role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    reserve_price: Decimal,
    sold: bool,
    artist_id: Option<i32>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            title: row.title,
            reserve_price: Money::new(row.reserve_price),
            sold: row.sold,
            artist_id: row.artist_id.map(UserId::new),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: Option<i32>,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    country: String,
    postal_code: String,
    city: String,
    line1: String,
    line2: Option<String>,
}

impl From<AddressRow> for ManagedAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            address: ShippingAddress {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
                country: row.country,
                postal_code: row.postal_code,
                city: row.city,
                line1: row.line1,
                line2: row.line2,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    address_id: i32,
    status: OrderStatus,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    price_at_purchase: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            price_at_purchase: Money::new(row.price_at_purchase),
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, country, \
                               postal_code, city, line1, line2";

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GalleryStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, reserve_price, sold, artist_id
            FROM gallery.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO gallery.products (title, reserve_price, artist_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, reserve_price, sold, artist_id
            ",
        )
        .bind(&product.title)
        .bind(product.reserve_price)
        .bind(product.artist_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, role, created_at
            FROM gallery.users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn user_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT id, email, role, created_at, password_hash
            FROM gallery.users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(CredentialRow {
                user,
                password_hash: Some(hash),
            }) => Ok(Some((user.try_into()?, hash))),
            _ => Ok(None),
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO gallery.users (email, role, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, role, created_at
            ",
        )
        .bind(&user.email)
        .bind(user.role)
        .bind(user.password_hash.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        row.try_into()
    }

    async fn latest_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<ManagedAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM gallery.addresses \
             WHERE user_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ManagedAddress::from))
    }

    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckoutUnit { tx }))
    }
}

// =============================================================================
// Checkout Unit
// =============================================================================

/// A checkout running inside one database transaction.
///
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
struct PgCheckoutUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutUnit for PgCheckoutUnit {
    async fn find_address(
        &mut self,
        owner: Option<UserId>,
        key: &AddressKey<'_>,
    ) -> Result<Option<ManagedAddress>, RepositoryError> {
        let row = match owner {
            Some(user_id) => {
                sqlx::query_as::<_, AddressRow>(&format!(
                    "SELECT {ADDRESS_COLUMNS} FROM gallery.addresses \
                     WHERE line1 = $1 AND city = $2 AND postal_code = $3 AND user_id = $4 \
                     ORDER BY id LIMIT 1"
                ))
                .bind(key.line1)
                .bind(key.city)
                .bind(key.postal_code)
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, AddressRow>(&format!(
                    "SELECT {ADDRESS_COLUMNS} FROM gallery.addresses \
                     WHERE line1 = $1 AND city = $2 AND postal_code = $3 \
                     ORDER BY id LIMIT 1"
                ))
                .bind(key.line1)
                .bind(key.city)
                .bind(key.postal_code)
                .fetch_optional(&mut *self.tx)
                .await?
            }
        };

        Ok(row.map(ManagedAddress::from))
    }

    async fn insert_address(
        &mut self,
        owner: Option<UserId>,
        address: &ShippingAddress,
    ) -> Result<ManagedAddress, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "INSERT INTO gallery.addresses \
             (user_id, first_name, last_name, email, phone, country, postal_code, city, line1, line2) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(owner)
        .bind(&address.first_name)
        .bind(&address.last_name)
        .bind(&address.email)
        .bind(&address.phone)
        .bind(&address.country)
        .bind(&address.postal_code)
        .bind(&address.city)
        .bind(&address.line1)
        .bind(address.line2.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, reserve_price, sold, artist_id
            FROM gallery.products
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn mark_sold(&mut self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE gallery.products
            SET sold = TRUE
            WHERE id = $1 AND sold = FALSE
            ",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO gallery.orders (user_id, address_id, status)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, address_id, status, placed_at
            ",
        )
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(order.status)
        .fetch_one(&mut *self.tx)
        .await?;

        let order_id = OrderId::new(row.id);
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let item_row = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO gallery.order_items (order_id, product_id, price_at_purchase)
                VALUES ($1, $2, $3)
                RETURNING id, order_id, product_id, price_at_purchase
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.price_at_purchase)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| conflict_on_unique(e, "order item for product"))?;

            items.push(OrderItem::from(item_row));
        }

        Ok(Order {
            id: order_id,
            user_id: row.user_id.map(UserId::new),
            address_id: AddressId::new(row.address_id),
            status: row.status,
            placed_at: row.placed_at,
            items,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::db::create_pool;

    /// Store against `GALLERY_TEST_DATABASE_URL`, migrated. `None` when unset.
    async fn store() -> Option<PgStore> {
        let url = std::env::var("GALLERY_TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&SecretString::from(url)).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Some(PgStore::new(pool))
    }

    async fn listed(store: &PgStore, title: &str) -> Product {
        store
            .create_product(&NewProduct {
                title: title.to_owned(),
                reserve_price: Money::new(Decimal::new(100, 0)),
                artist_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL at GALLERY_TEST_DATABASE_URL"]
    async fn test_dropped_unit_rolls_back_sold_flag() {
        let Some(store) = store().await else { return };
        let product = listed(&store, "Rollback").await;

        let mut unit = store.begin().await.unwrap();
        assert!(unit.lock_product(product.id).await.unwrap().is_some());
        assert!(unit.mark_sold(product.id).await.unwrap());
        assert!(!unit.mark_sold(product.id).await.unwrap());
        drop(unit);

        assert!(!store.product(product.id).await.unwrap().unwrap().sold);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL at GALLERY_TEST_DATABASE_URL"]
    async fn test_row_lock_serializes_checkouts() {
        let Some(store) = store().await else { return };
        let product = listed(&store, "Contended").await;

        let mut first = store.begin().await.unwrap();
        first.lock_product(product.id).await.unwrap().unwrap();

        let contender = store.clone();
        let second = tokio::spawn(async move {
            let mut unit = contender.begin().await.unwrap();
            let seen = unit.lock_product(product.id).await.unwrap().unwrap();
            let flipped = unit.mark_sold(product.id).await.unwrap();
            (seen.sold, flipped)
        });

        // The second unit waits on the row lock.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!second.is_finished());

        assert!(first.mark_sold(product.id).await.unwrap());
        first.commit().await.unwrap();

        assert_eq!(second.await.unwrap(), (true, false));
        assert!(store.product(product.id).await.unwrap().unwrap().sold);
    }
}
