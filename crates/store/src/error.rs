use common::{OrderId, ProductId};
use domain::{OrderError, OrderStatus};
use thiserror::Error;

/// Errors that can occur when reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No stock record exists for the product.
    #[error("No stock record for product {0}")]
    StockNotFound(ProductId),

    /// Applying the delta would take the quantity below zero.
    /// The ledger is left unchanged.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, change {delta}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        delta: i64,
    },

    /// A stock record already exists for the product.
    #[error("Stock record already exists for product {0}")]
    DuplicateStock(ProductId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with the same id was already persisted.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The persisted status changed since it was read.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The backend could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be mapped back into the domain.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for transient failures where the backend itself was
    /// unreachable, as opposed to a rejected operation.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

impl From<OrderError> for StoreError {
    fn from(err: OrderError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
