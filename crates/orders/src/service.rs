//! Order lifecycle orchestration.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use common::{OrderId, Principal, ProductId};
use domain::{NewOrderItem, Order, OrderError, OrderStatus, resolve_owner};
use inventory::{AppliedChange, FailedChange, InventoryService, StockChange};
use lock::{LockError, LockManager, LockSet, order_key, product_key};
use serde::Serialize;
use store::{OrderRepository, StockLedger};

use crate::error::{OrderServiceError, Result};

/// Tunables for lock-guarded operations.
#[derive(Debug, Clone, Copy)]
pub struct ReservationConfig {
    /// Lifetime of every product and order lock. Must exceed the worst
    /// case time to reserve or restore one order's items.
    pub lock_ttl: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_millis(5000),
        }
    }
}

/// Result of a cancellation: the final status and which items went back
/// to stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub restored: Vec<AppliedChange>,
    pub failed: Vec<FailedChange>,
}

impl CancelReport {
    /// True when every item was returned to stock.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The order component.
///
/// Creation reserves stock under one lock per distinct product, so
/// checkouts for the same product run one at a time while disjoint
/// product sets proceed in parallel. Cancellation and confirmation are
/// serialized per order so stock is restored at most once.
pub struct OrderService<R, L, M>
where
    R: OrderRepository,
    L: StockLedger,
    M: LockManager + Clone + 'static,
{
    orders: R,
    inventory: InventoryService<L>,
    locks: M,
    config: ReservationConfig,
}

impl<R, L, M> OrderService<R, L, M>
where
    R: OrderRepository,
    L: StockLedger,
    M: LockManager + Clone + 'static,
{
    pub fn new(orders: R, inventory: InventoryService<L>, locks: M) -> Self {
        Self::with_config(orders, inventory, locks, ReservationConfig::default())
    }

    pub fn with_config(
        orders: R,
        inventory: InventoryService<L>,
        locks: M,
        config: ReservationConfig,
    ) -> Self {
        Self {
            orders,
            inventory,
            locks,
            config,
        }
    }

    pub fn inventory(&self) -> &InventoryService<L> {
        &self.inventory
    }

    pub fn repository(&self) -> &R {
        &self.orders
    }

    /// Places an order and reserves its stock.
    ///
    /// An authenticated principal owns the order; otherwise `guest_email`
    /// is required. Nothing is persisted or decremented unless every
    /// product is locked and has enough stock.
    #[tracing::instrument(skip(self, principal, items), fields(items = items.len()))]
    pub async fn create_order(
        &self,
        principal: Option<&Principal>,
        guest_email: Option<&str>,
        items: &[NewOrderItem],
    ) -> Result<Order> {
        let start = Instant::now();
        let result = self.place_order(principal, guest_email, items).await;
        metrics::histogram!("order_create_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id(), owner = order.owner(), "Order created");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason_code())
                    .increment(1);
                tracing::info!(reason = e.reason_code(), error = %e, "Order rejected");
            }
        }
        result
    }

    async fn place_order(
        &self,
        principal: Option<&Principal>,
        guest_email: Option<&str>,
        items: &[NewOrderItem],
    ) -> Result<Order> {
        if items.is_empty() {
            return Err(OrderError::NoItems.into());
        }
        for item in items {
            item.validated_quantity()?;
        }
        let owner = resolve_owner(principal, guest_email)?;
        let order = Order::place(owner, items)?;
        let demand = order.demand();

        // Keys come from an ordered map, so every caller locks in the
        // same order.
        let keys: Vec<String> = demand
            .keys()
            .map(|product_id| product_key(*product_id))
            .collect();
        let locks = match LockSet::acquire_all(&self.locks, keys, self.config.lock_ttl).await {
            Ok(locks) => locks,
            Err(LockError::Busy { key }) => {
                metrics::counter!("reservation_lock_busy_total").increment(1);
                tracing::debug!(key = %key, "Product lock busy");
                return Err(OrderServiceError::ReservationInProgress);
            }
            Err(e) => return Err(e.into()),
        };

        let result = self.reserve(order, &demand).await;
        locks.release().await;
        result
    }

    /// Runs with every product lock held.
    async fn reserve(&self, order: Order, demand: &BTreeMap<ProductId, i64>) -> Result<Order> {
        for (&product_id, &requested) in demand {
            let available = self.inventory.check_stock(product_id).await?;
            if available < requested {
                return Err(OrderServiceError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                });
            }
        }

        self.orders.insert(&order).await?;

        let mut applied: Vec<StockChange> = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let change = StockChange::new(item.product_id, item.reservation_delta());
            match self
                .inventory
                .adjust_stock(change.product_id, change.delta, Some("reservation"))
                .await
            {
                Ok(_) => applied.push(change),
                Err(e) => {
                    tracing::error!(
                        order_id = %order.id(),
                        product_id = %item.product_id,
                        delta = change.delta,
                        error = %e,
                        "Reservation failed, compensating"
                    );
                    self.compensate(&order, &applied).await;
                    return Err(e.into());
                }
            }
        }

        Ok(order)
    }

    /// Returns already reserved stock and cancels an order whose
    /// reservation could not complete.
    async fn compensate(&self, order: &Order, applied: &[StockChange]) {
        let restores: Vec<StockChange> = applied
            .iter()
            .map(|change| StockChange::new(change.product_id, -change.delta))
            .collect();
        let report = self.inventory.batch_adjust_stock(&restores).await;
        for failed in &report.failed {
            metrics::counter!("stock_restore_failures_total").increment(1);
            tracing::error!(
                order_id = %order.id(),
                product_id = %failed.product_id,
                delta = failed.delta,
                reason = %failed.reason,
                "Compensating restore failed"
            );
        }

        let mut cancelled = order.clone();
        if let Err(e) = cancelled.cancel() {
            tracing::error!(order_id = %order.id(), error = %e, "Cannot cancel failed order");
            return;
        }
        match self.orders.update_status(&cancelled, order.status()).await {
            Ok(()) => {
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::warn!(order_id = %order.id(), "Order cancelled after failed reservation");
            }
            Err(e) => tracing::error!(
                order_id = %order.id(),
                error = %e,
                "Failed to cancel order after failed reservation"
            ),
        }
    }

    /// Cancels an order and returns its items to stock.
    ///
    /// Only the owner or an admin may cancel. Restores are best-effort
    /// per item: a failed restore is logged and reported but does not
    /// stop the cancellation.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.email))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        requester: &Principal,
    ) -> Result<CancelReport> {
        let order = self.load_accessible(order_id, requester).await?;
        order
            .ensure_cancellable()
            .map_err(|e| OrderServiceError::for_order(order_id, e))?;

        let lock = self.lock_order(order_id).await?;
        let result = self.cancel_locked(order_id).await;
        lock.release().await;

        let report = result?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(
            %order_id,
            restored = report.restored.len(),
            failed = report.failed.len(),
            "Order cancelled"
        );
        Ok(report)
    }

    async fn cancel_locked(&self, order_id: OrderId) -> Result<CancelReport> {
        // Re-read under the lock: a cancellation that finished while we
        // waited must not restore stock a second time.
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderServiceError::OrderNotFound(order_id))?;
        let expected = order.status();
        order
            .cancel()
            .map_err(|e| OrderServiceError::for_order(order_id, e))?;

        let restores: Vec<StockChange> = order
            .items()
            .iter()
            .map(|item| StockChange::new(item.product_id, item.restore_delta()))
            .collect();
        let report = self.inventory.batch_adjust_stock(&restores).await;
        for failed in &report.failed {
            metrics::counter!("stock_restore_failures_total").increment(1);
            tracing::warn!(
                %order_id,
                product_id = %failed.product_id,
                delta = failed.delta,
                reason = %failed.reason,
                "Stock restore failed"
            );
        }

        if let Err(e) = self.orders.update_status(&order, expected).await {
            tracing::error!(
                %order_id,
                restored = report.applied.len(),
                error = %e,
                "Stock restored but cancellation not recorded"
            );
            return Err(e.into());
        }

        Ok(CancelReport {
            order_id,
            status: order.status(),
            restored: report.applied,
            failed: report.failed,
        })
    }

    /// Confirms a pending order. Admin only; stock is not touched.
    #[tracing::instrument(skip(self, principal), fields(principal = %principal.email))]
    pub async fn confirm_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        if !principal.is_admin() {
            return Err(OrderServiceError::Forbidden(order_id));
        }

        let lock = self.lock_order(order_id).await?;
        let result = self.confirm_locked(order_id).await;
        lock.release().await;

        let order = result?;
        metrics::counter!("orders_confirmed_total").increment(1);
        tracing::info!(%order_id, "Order confirmed");
        Ok(order)
    }

    async fn confirm_locked(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderServiceError::OrderNotFound(order_id))?;
        let expected = order.status();
        order
            .confirm()
            .map_err(|e| OrderServiceError::for_order(order_id, e))?;
        self.orders.update_status(&order, expected).await?;
        Ok(order)
    }

    /// Lists the orders visible to a principal, newest first. Admins see
    /// every order.
    #[tracing::instrument(skip(self, principal), fields(principal = %principal.email))]
    pub async fn list_orders(&self, principal: &Principal) -> Result<Vec<Order>> {
        let orders = if principal.is_admin() {
            self.orders.list_all().await?
        } else {
            self.orders.list_by_owner(&principal.email).await?
        };
        Ok(orders)
    }

    /// Returns one order if the principal may see it.
    #[tracing::instrument(skip(self, principal))]
    pub async fn get_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        self.load_accessible(order_id, principal).await
    }

    async fn load_accessible(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderServiceError::OrderNotFound(order_id))?;
        if !order.is_accessible_by(principal) {
            return Err(OrderServiceError::Forbidden(order_id));
        }
        Ok(order)
    }

    async fn lock_order(&self, order_id: OrderId) -> Result<LockSet<M>> {
        LockSet::acquire_all(&self.locks, [order_key(order_id)], self.config.lock_ttl)
            .await
            .map_err(|e| match e {
                LockError::Busy { .. } => OrderServiceError::OrderBusy(order_id),
                other => other.into(),
            })
    }
}
