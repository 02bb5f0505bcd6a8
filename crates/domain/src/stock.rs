//! Stock ledger record.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

/// Available quantity of one product.
///
/// The quantity never goes negative: every change goes through
/// [`StockRecord::adjusted`], which refuses deltas that would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            updated_at: Utc::now(),
        }
    }

    /// Returns the quantity after applying `delta`, or `None` if the
    /// result would be negative or overflow.
    pub fn adjusted(&self, delta: i64) -> Option<i64> {
        self.quantity.checked_add(delta).filter(|q| *q >= 0)
    }
}
