//! Distributed locks guarding stock reservation and order cancellation.
//!
//! Two backends implement [`LockManager`]: an in-memory one for a single
//! process and tests, and a Redis one shared between service instances.

pub mod error;
pub mod guard;
pub mod manager;
pub mod memory;
pub mod redis_lock;

pub use error::LockError;
pub use guard::LockSet;
pub use manager::{LockManager, LockToken, order_key, product_key};
pub use memory::InMemoryLockManager;
pub use redis_lock::RedisLockManager;
