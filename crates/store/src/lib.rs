//! Persisted state for the order reservation service.
//!
//! Two ports, each with an in-memory and a PostgreSQL implementation:
//! - [`StockLedger`]: per-product stock counters with atomic adjust
//! - [`OrderRepository`]: orders and their immutable lines
//!
//! Handles are cheap to clone and are injected into the components that
//! use them; the process entry point owns the pool's lifecycle.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderRepository, InMemoryStockLedger};
pub use postgres::{PostgresOrderRepository, PostgresStockLedger, connect, run_migrations};
pub use store::{OrderRepository, StockLedger};
