use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId};
use domain::{Order, OrderStatus, StockRecord};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{OrderRepository, StockLedger},
};

/// In-memory stock ledger for tests and single-process deployments.
///
/// Every adjust runs under the write lock, which gives the same
/// check-and-write atomicity as the conditional UPDATE in PostgreSQL.
/// Failure switches let tests simulate an unreachable backend.
#[derive(Clone, Default)]
pub struct InMemoryStockLedger {
    records: Arc<RwLock<HashMap<ProductId, StockRecord>>>,
    failing_products: Arc<RwLock<HashSet<ProductId>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStockLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger seeded with `(product, quantity)` pairs.
    pub async fn with_stock(stock: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let ledger = Self::new();
        {
            let mut records = ledger.records.write().await;
            for (product_id, quantity) in stock {
                let product_id = ProductId::new(product_id);
                records.insert(product_id, StockRecord::new(product_id, quantity));
            }
        }
        ledger
    }

    /// Returns the current quantity of a product, if it has a record.
    pub async fn quantity(&self, product_id: ProductId) -> Option<i64> {
        self.records
            .read()
            .await
            .get(&product_id)
            .map(|record| record.quantity)
    }

    /// Drops a product's record, as if the catalog had deleted it.
    pub async fn remove(&self, product_id: ProductId) {
        self.records.write().await.remove(&product_id);
    }

    /// Makes every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes adjusts for one product fail as if the backend were unreachable.
    pub async fn fail_adjustments_for(&self, product_id: ProductId) {
        self.failing_products.write().await.insert(product_id);
    }

    /// Clears every failure switch.
    pub async fn clear_failures(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
        self.failing_products.write().await.clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory stock ledger switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn get(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        self.check_available()?;
        Ok(self.records.read().await.get(&product_id).cloned())
    }

    async fn insert(&self, product_id: ProductId, quantity: i64) -> Result<StockRecord> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&product_id) {
            return Err(StoreError::DuplicateStock(product_id));
        }
        let record = StockRecord::new(product_id, quantity);
        records.insert(product_id, record.clone());
        Ok(record)
    }

    async fn adjust(&self, product_id: ProductId, delta: i64) -> Result<i64> {
        self.check_available()?;
        if self.failing_products.read().await.contains(&product_id) {
            return Err(StoreError::Unavailable(format!(
                "adjustments for product {product_id} switched off"
            )));
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&product_id)
            .ok_or(StoreError::StockNotFound(product_id))?;

        let quantity = record
            .adjusted(delta)
            .ok_or(StoreError::InsufficientStock {
                product_id,
                available: record.quantity,
                delta,
            })?;

        record.quantity = quantity;
        record.updated_at = Utc::now();
        Ok(quantity)
    }
}

/// In-memory order repository for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<Vec<Order>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Makes every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory order repository switched off".to_string(),
            ));
        }
        Ok(())
    }

    /// Orders are stored in insertion order; reversing first keeps ties
    /// on `created_at` newest first under the stable sort.
    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.reverse();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        orders
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.id() == order.id()) {
            return Err(StoreError::DuplicateOrder(order.id()));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.check_available()?;
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.id() == order_id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.check_available()?;
        let orders = self.orders.read().await.clone();
        Ok(Self::newest_first(orders))
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Order>> {
        self.check_available()?;
        let orders = self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.owner().eq_ignore_ascii_case(owner))
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        let stored = orders
            .iter_mut()
            .find(|o| o.id() == order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;

        if stored.status() != expected {
            return Err(StoreError::StatusConflict {
                order_id: order.id(),
                expected,
                actual: stored.status(),
            });
        }

        *stored = Order::from_parts(
            stored.id(),
            stored.owner().to_string(),
            order.status(),
            stored.items().to_vec(),
            stored.created_at(),
            order.updated_at(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::NewOrderItem;

    use super::*;

    fn order(owner: &str) -> Order {
        Order::place(owner, &[NewOrderItem::new(7, 5)]).unwrap()
    }

    #[tokio::test]
    async fn ledger_insert_get_and_duplicate() {
        let ledger = InMemoryStockLedger::new();
        let product = ProductId::new(7);

        ledger.insert(product, 10).await.unwrap();
        assert_eq!(ledger.get(product).await.unwrap().unwrap().quantity, 10);

        let err = ledger.insert(product, 3).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateStock(p) if p == product));
        assert_eq!(ledger.quantity(product).await, Some(10));
    }

    #[tokio::test]
    async fn ledger_adjust_refuses_negative_and_leaves_quantity() {
        let ledger = InMemoryStockLedger::with_stock([(1, 2)]).await;
        let product = ProductId::new(1);

        let err = ledger.adjust(product, -3).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                available: 2,
                delta: -3,
                ..
            }
        ));
        assert_eq!(ledger.quantity(product).await, Some(2));

        assert_eq!(ledger.adjust(product, -2).await.unwrap(), 0);
        assert_eq!(ledger.adjust(product, 4).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn ledger_adjust_missing_record() {
        let ledger = InMemoryStockLedger::new();
        let err = ledger.adjust(ProductId::new(9), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::StockNotFound(_)));
    }

    #[tokio::test]
    async fn ledger_concurrent_adjusts_never_go_negative() {
        let ledger = InMemoryStockLedger::with_stock([(1, 10)]).await;
        let product = ProductId::new(1);

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(
                async move { ledger.adjust(product, -1).await },
            ));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(ledger.quantity(product).await, Some(0));
    }

    #[tokio::test]
    async fn ledger_failure_switches() {
        let ledger = InMemoryStockLedger::with_stock([(1, 5), (2, 5)]).await;
        ledger.fail_adjustments_for(ProductId::new(2)).await;

        assert!(ledger.adjust(ProductId::new(1), -1).await.is_ok());
        let err = ledger.adjust(ProductId::new(2), -1).await.unwrap_err();
        assert!(err.is_unavailable());

        ledger.set_unavailable(true);
        assert!(ledger.get(ProductId::new(1)).await.unwrap_err().is_unavailable());

        ledger.clear_failures().await;
        assert!(ledger.adjust(ProductId::new(2), -1).await.is_ok());
    }

    #[tokio::test]
    async fn repository_insert_get_and_list() {
        let repo = InMemoryOrderRepository::new();
        let first = order("ana@example.com");
        let second = order("bob@example.com");
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let loaded = repo.get(first.id()).await.unwrap().unwrap();
        assert_eq!(loaded, first);

        assert_eq!(repo.list_all().await.unwrap().len(), 2);
        let anas = repo.list_by_owner("ANA@example.com").await.unwrap();
        assert_eq!(anas.len(), 1);
        assert_eq!(anas[0].id(), first.id());

        assert!(matches!(
            repo.insert(&first).await,
            Err(StoreError::DuplicateOrder(_))
        ));
    }

    #[tokio::test]
    async fn repository_update_status_is_compare_and_set() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order("ana@example.com");
        repo.insert(&order).await.unwrap();

        order.cancel().unwrap();
        repo.update_status(&order, OrderStatus::Pending).await.unwrap();
        let stored = repo.get(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);

        let err = repo
            .update_status(&order, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                actual: OrderStatus::Cancelled,
                ..
            }
        ));
    }
}
