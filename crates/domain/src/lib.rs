//! Domain layer for the order reservation service.
//!
//! This crate holds the pure model, with no I/O:
//! - `Order` / `OrderItem` and the order status state machine
//! - owner resolution for authenticated and guest checkout
//! - `StockRecord`, whose quantity never goes negative

pub mod error;
pub mod order;
pub mod stock;

pub use error::OrderError;
pub use order::{NewOrderItem, Order, OrderItem, OrderStatus, resolve_owner};
pub use stock::StockRecord;
