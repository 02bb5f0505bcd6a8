//! Order entity, lines, ownership and lifecycle.

mod item;
mod model;
mod owner;
mod status;

pub use item::{NewOrderItem, OrderItem};
pub use model::Order;
pub use owner::resolve_owner;
pub use status::OrderStatus;
