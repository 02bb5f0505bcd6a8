//! Order component.
//!
//! Orchestrates the order lifecycle against the inventory component:
//! creation reserves stock under per-product locks, cancellation returns
//! it, confirmation only moves the status. There is no central
//! coordinator; each flow compensates its own partial work.

pub mod error;
pub mod service;

pub use error::{OrderServiceError, Result};
pub use service::{CancelReport, OrderService, ReservationConfig};
