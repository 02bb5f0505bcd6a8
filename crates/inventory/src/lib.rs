//! Inventory component.
//!
//! Owns the stock ledger: lookup, registration of new products and the
//! atomic adjust that every reservation and restore goes through.

pub mod error;
pub mod service;

pub use error::{InventoryError, Result};
pub use service::{AppliedChange, BatchAdjustReport, FailedChange, InventoryService, StockChange};
