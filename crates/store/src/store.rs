use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Order, OrderStatus, StockRecord};

use crate::Result;

/// Durable per-product stock counters.
///
/// `adjust` is the single atomicity boundary for stock: the check that
/// `current + delta >= 0` and the write happen as one step, so two
/// concurrent adjusts can never interleave and push a quantity below
/// zero. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Reads the stock record for a product.
    ///
    /// Returns None if the product has no record.
    async fn get(&self, product_id: ProductId) -> Result<Option<StockRecord>>;

    /// Creates the stock record for a product.
    ///
    /// Fails with `DuplicateStock` if a record already exists.
    async fn insert(&self, product_id: ProductId, quantity: i64) -> Result<StockRecord>;

    /// Atomically applies `delta` and returns the new quantity.
    ///
    /// Fails with `InsufficientStock` (ledger unchanged) if the result
    /// would be negative, or `StockNotFound` if there is no record.
    async fn adjust(&self, product_id: ProductId, delta: i64) -> Result<i64>;
}

/// Persistence for orders and their lines.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order together with all of its items.
    ///
    /// The order and its items are written atomically.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Loads an order with its items in submission order.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Lists the orders owned by an email address, newest first.
    ///
    /// Owner matching is case-insensitive.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Order>>;

    /// Persists the status of `order` if the stored status still equals
    /// `expected`.
    ///
    /// Fails with `StatusConflict` if another writer got there first.
    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<()>;
}

#[async_trait]
impl<T> StockLedger for Arc<T>
where
    T: StockLedger + ?Sized,
{
    async fn get(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        (**self).get(product_id).await
    }

    async fn insert(&self, product_id: ProductId, quantity: i64) -> Result<StockRecord> {
        (**self).insert(product_id, quantity).await
    }

    async fn adjust(&self, product_id: ProductId, delta: i64) -> Result<i64> {
        (**self).adjust(product_id, delta).await
    }
}

#[async_trait]
impl<T> OrderRepository for Arc<T>
where
    T: OrderRepository + ?Sized,
{
    async fn insert(&self, order: &Order) -> Result<()> {
        (**self).insert(order).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).get(order_id).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        (**self).list_all().await
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Order>> {
        (**self).list_by_owner(owner).await
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        (**self).update_status(order, expected).await
    }
}
