//! Domain error types.

use common::{OrderId, ProductId};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by order validation and lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// Product id the catalog could never have issued.
    #[error("Invalid product id: {0}")]
    InvalidProductId(ProductId),

    /// Guest checkout without an email address.
    #[error("An email is required for guest checkout")]
    GuestEmailRequired,

    /// Malformed email address.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Order was already cancelled and its stock restored.
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    /// Order is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Persisted status string that does not name a known status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Returns true for errors caused by malformed caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::NoItems
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidProductId(_)
                | OrderError::GuestEmailRequired
                | OrderError::InvalidEmail(_)
        )
    }
}
