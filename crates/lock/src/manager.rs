//! Lock manager trait and key naming.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, ProductId};
use uuid::Uuid;

use crate::error::LockError;

/// Opaque proof of holding a lock. Only the holder's token releases it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Creates a new random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Key guarding the stock of one product during a reservation.
pub fn product_key(product_id: ProductId) -> String {
    format!("lock:product:{product_id}")
}

/// Key guarding one order while it is being cancelled.
pub fn order_key(order_id: OrderId) -> String {
    format!("lock:order:{order_id}")
}

/// Keyed mutual exclusion with automatic expiry.
///
/// Acquisition is a single non-blocking attempt: a held key fails fast
/// with [`LockError::Busy`] and callers must not queue. The TTL bounds
/// how long a crashed holder can keep a key; release is best-effort.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Tries once to take `key` for `ttl`.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken, LockError>;

    /// Releases `key` if it is still held with `token`.
    ///
    /// Returns false if the key had already expired or changed hands.
    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError>;
}

#[async_trait]
impl<T> LockManager for Arc<T>
where
    T: LockManager + ?Sized,
{
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken, LockError> {
        (**self).acquire(key, ttl).await
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        (**self).release(key, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert_eq!(product_key(ProductId::new(7)), "lock:product:7");
        let order_id = OrderId::new();
        assert_eq!(order_key(order_id), format!("lock:order:{order_id}"));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(LockToken::new(), LockToken::new());
    }
}
