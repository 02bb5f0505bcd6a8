//! Order service error types.

use common::{OrderId, ProductId};
use domain::{OrderError, OrderStatus};
use inventory::InventoryError;
use lock::LockError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the order component.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The request failed domain validation.
    #[error("{0}")]
    Validation(OrderError),

    /// The caller may not act on this order.
    #[error("Not allowed to access order {0}")]
    Forbidden(OrderId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A requested product has no stock record.
    #[error("No stock record for product {0}")]
    StockNotFound(ProductId),

    /// Stock does not cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// Another order is reserving one of the products.
    #[error("Product reservation in progress, try again")]
    ReservationInProgress,

    /// Another request is changing this order.
    #[error("Order {0} is being updated by another request, try again")]
    OrderBusy(OrderId),

    /// The order was already cancelled.
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    /// The order's status does not allow the operation.
    #[error("Cannot {action} order {order_id} in {status} status")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// A backing service could not be reached.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderServiceError {
    /// Stable machine-readable code for clients and metric labels.
    pub fn reason_code(&self) -> &'static str {
        match self {
            OrderServiceError::Validation(OrderError::GuestEmailRequired) => {
                "guest_email_required"
            }
            OrderServiceError::Validation(_) => "validation_failed",
            OrderServiceError::Forbidden(_) => "forbidden",
            OrderServiceError::OrderNotFound(_) => "order_not_found",
            OrderServiceError::StockNotFound(_) => "stock_not_found",
            OrderServiceError::InsufficientStock { .. } => "insufficient_stock",
            OrderServiceError::ReservationInProgress => "reservation_in_progress",
            OrderServiceError::OrderBusy(_) => "cancellation_in_progress",
            OrderServiceError::AlreadyCancelled(_) => "order_already_cancelled",
            OrderServiceError::InvalidTransition { .. } => "invalid_transition",
            OrderServiceError::Unavailable(_) => "upstream_unavailable",
            OrderServiceError::Internal(_) => "internal_error",
        }
    }

    /// Maps a domain error raised while acting on a specific order.
    pub(crate) fn for_order(order_id: OrderId, err: OrderError) -> Self {
        match err {
            OrderError::AlreadyCancelled(id) => OrderServiceError::AlreadyCancelled(id),
            OrderError::InvalidStateTransition {
                current_status,
                action,
            } => OrderServiceError::InvalidTransition {
                order_id,
                status: current_status,
                action,
            },
            OrderError::UnknownStatus(status) => {
                OrderServiceError::Internal(format!("unknown status {status}"))
            }
            other => OrderServiceError::Validation(other),
        }
    }
}

impl From<OrderError> for OrderServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::AlreadyCancelled(id) => OrderServiceError::AlreadyCancelled(id),
            OrderError::UnknownStatus(status) => {
                OrderServiceError::Internal(format!("unknown status {status}"))
            }
            other => OrderServiceError::Validation(other),
        }
    }
}

impl From<StoreError> for OrderServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => OrderServiceError::OrderNotFound(id),
            StoreError::StockNotFound(id) => OrderServiceError::StockNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                available,
                delta,
            } => OrderServiceError::InsufficientStock {
                product_id,
                available,
                requested: -delta,
            },
            StoreError::StatusConflict {
                order_id,
                actual: OrderStatus::Cancelled,
                ..
            } => OrderServiceError::AlreadyCancelled(order_id),
            StoreError::StatusConflict {
                order_id, actual, ..
            } => OrderServiceError::InvalidTransition {
                order_id,
                status: actual,
                action: "update",
            },
            err if err.is_unavailable() => OrderServiceError::Unavailable(err.to_string()),
            err => OrderServiceError::Internal(err.to_string()),
        }
    }
}

impl From<InventoryError> for OrderServiceError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => OrderServiceError::StockNotFound(id),
            InventoryError::InsufficientStock {
                product_id,
                available,
                requested,
            } => OrderServiceError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            InventoryError::Unavailable(msg) => OrderServiceError::Unavailable(msg),
            other => OrderServiceError::Internal(other.to_string()),
        }
    }
}

impl From<LockError> for OrderServiceError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { .. } => OrderServiceError::ReservationInProgress,
            LockError::Backend(msg) => OrderServiceError::Unavailable(msg),
        }
    }
}

/// Convenience type alias for order service results.
pub type Result<T> = std::result::Result<T, OrderServiceError>;
