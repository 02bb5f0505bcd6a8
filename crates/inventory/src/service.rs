//! Inventory service over a stock ledger.

use common::ProductId;
use domain::StockRecord;
use serde::Serialize;
use store::StockLedger;

use crate::error::{InventoryError, Result};

/// One entry of a batch adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: ProductId,
    pub delta: i64,
}

impl StockChange {
    pub fn new(product_id: impl Into<ProductId>, delta: i64) -> Self {
        Self {
            product_id: product_id.into(),
            delta,
        }
    }
}

/// A change that was applied, with the resulting quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub product_id: ProductId,
    pub delta: i64,
    pub quantity: i64,
}

/// A change that was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChange {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: String,
}

/// Outcome of a batch adjustment. Items are independent: a failure does
/// not undo the items applied before or after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchAdjustReport {
    pub applied: Vec<AppliedChange>,
    pub failed: Vec<FailedChange>,
}

impl BatchAdjustReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The inventory component.
///
/// Every stock mutation in the system goes through [`adjust_stock`],
/// which delegates to the ledger's atomic check-and-write.
///
/// [`adjust_stock`]: InventoryService::adjust_stock
#[derive(Debug, Clone)]
pub struct InventoryService<L: StockLedger> {
    ledger: L,
}

impl<L: StockLedger> InventoryService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Returns the underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the current quantity of a product.
    #[tracing::instrument(skip(self))]
    pub async fn check_stock(&self, product_id: ProductId) -> Result<i64> {
        self.ledger
            .get(product_id)
            .await?
            .map(|record| record.quantity)
            .ok_or(InventoryError::NotFound(product_id))
    }

    /// Registers the stock record for a new product.
    #[tracing::instrument(skip(self))]
    pub async fn create_stock(
        &self,
        product_id: ProductId,
        initial_quantity: i64,
    ) -> Result<StockRecord> {
        if !product_id.is_valid() {
            return Err(InventoryError::Validation(format!(
                "product id must be positive, got {product_id}"
            )));
        }
        if initial_quantity < 0 {
            return Err(InventoryError::Validation(format!(
                "initial quantity must not be negative, got {initial_quantity}"
            )));
        }

        let record = self.ledger.insert(product_id, initial_quantity).await?;
        tracing::info!(%product_id, quantity = initial_quantity, "Stock record created");
        Ok(record)
    }

    /// Atomically applies `delta` to a product's stock and returns the new
    /// quantity. On failure the ledger is unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: Option<&str>,
    ) -> Result<i64> {
        match self.ledger.adjust(product_id, delta).await {
            Ok(quantity) => {
                metrics::counter!("stock_adjustments_total", "outcome" => "applied").increment(1);
                tracing::info!(
                    %product_id,
                    delta,
                    quantity,
                    reason = reason.unwrap_or(""),
                    "Stock adjusted"
                );
                Ok(quantity)
            }
            Err(e) => {
                let err = InventoryError::from(e);
                metrics::counter!("stock_adjustments_total", "outcome" => err.outcome())
                    .increment(1);
                tracing::debug!(%product_id, delta, error = %err, "Stock adjustment rejected");
                Err(err)
            }
        }
    }

    /// Applies each change independently and reports which succeeded.
    #[tracing::instrument(skip(self, changes), fields(count = changes.len()))]
    pub async fn batch_adjust_stock(&self, changes: &[StockChange]) -> BatchAdjustReport {
        let mut report = BatchAdjustReport::default();

        for change in changes {
            match self
                .adjust_stock(change.product_id, change.delta, Some("batch"))
                .await
            {
                Ok(quantity) => report.applied.push(AppliedChange {
                    product_id: change.product_id,
                    delta: change.delta,
                    quantity,
                }),
                Err(e) => {
                    tracing::warn!(
                        product_id = %change.product_id,
                        delta = change.delta,
                        error = %e,
                        "Batch stock change failed"
                    );
                    report.failed.push(FailedChange {
                        product_id: change.product_id,
                        delta: change.delta,
                        reason: e.outcome().to_string(),
                    });
                }
            }
        }

        report
    }
}
