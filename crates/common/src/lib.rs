//! Shared types for the order reservation service.

mod principal;
mod types;

pub use principal::{Principal, Role};
pub use types::{OrderId, OrderItemId, ProductId};
