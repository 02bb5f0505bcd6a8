//! Inventory error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur in inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The request was malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No stock record exists for the product.
    #[error("No stock record for product {0}")]
    NotFound(ProductId),

    /// A stock record already exists for the product.
    #[error("Stock record already exists for product {0}")]
    AlreadyExists(ProductId),

    /// The change would take the quantity below zero.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The stock backend could not be reached.
    #[error("Inventory unavailable: {0}")]
    Unavailable(String),

    /// Any other persistence failure.
    #[error("Inventory store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockNotFound(product_id) => InventoryError::NotFound(product_id),
            StoreError::DuplicateStock(product_id) => InventoryError::AlreadyExists(product_id),
            StoreError::InsufficientStock {
                product_id,
                available,
                delta,
            } => InventoryError::InsufficientStock {
                product_id,
                available,
                requested: -delta,
            },
            err if err.is_unavailable() => InventoryError::Unavailable(err.to_string()),
            err => InventoryError::Store(err),
        }
    }
}

impl InventoryError {
    /// Short label used for the `outcome` metric label and in failure
    /// reports returned to callers.
    pub fn outcome(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "invalid",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::AlreadyExists(_) => "duplicate",
            InventoryError::InsufficientStock { .. } => "insufficient",
            InventoryError::Unavailable(_) => "unavailable",
            InventoryError::Store(_) => "error",
        }
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
