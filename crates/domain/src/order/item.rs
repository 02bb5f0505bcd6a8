//! Order line value objects.

use common::{OrderId, OrderItemId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// A line requested at checkout, before validation.
///
/// The quantity is signed so that zero and negative requests can be
/// rejected with a domain error instead of a decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Validates the line and returns its quantity as a positive count.
    pub fn validated_quantity(&self) -> Result<u32, OrderError> {
        if !self.product_id.is_valid() {
            return Err(OrderError::InvalidProductId(self.product_id));
        }
        match u32::try_from(self.quantity) {
            Ok(quantity) if quantity > 0 => Ok(quantity),
            _ => Err(OrderError::InvalidQuantity {
                product_id: self.product_id,
                quantity: self.quantity,
            }),
        }
    }
}

/// A persisted order line. Immutable once its order has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderItem {
    /// Signed stock delta that reserves this line.
    pub fn reservation_delta(&self) -> i64 {
        -i64::from(self.quantity)
    }

    /// Signed stock delta that returns this line to stock.
    pub fn restore_delta(&self) -> i64 {
        i64::from(self.quantity)
    }
}
