//! In-memory lock manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::LockError;
use crate::manager::{LockManager, LockToken};

#[derive(Debug)]
struct Held {
    token: LockToken,
    expires_at: Instant,
}

/// Lock manager for a single process and for tests.
///
/// Expired entries are treated as free and overwritten on the next
/// acquire, which mirrors key expiry in Redis.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockManager {
    held: Arc<Mutex<HashMap<String, Held>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryLockManager {
    /// Creates a new lock manager with no keys held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` is currently held and not expired.
    pub async fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .await
            .get(key)
            .is_some_and(|h| h.expires_at > Instant::now())
    }

    /// Returns the number of live (unexpired) keys.
    pub async fn held_count(&self) -> usize {
        let now = Instant::now();
        self.held
            .lock()
            .await
            .values()
            .filter(|h| h.expires_at > now)
            .count()
    }

    /// Makes every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LockError::Backend(
                "in-memory lock manager switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken, LockError> {
        self.check_available()?;
        let now = Instant::now();
        let mut held = self.held.lock().await;

        if held.get(key).is_some_and(|h| h.expires_at > now) {
            return Err(LockError::Busy {
                key: key.to_string(),
            });
        }

        let token = LockToken::new();
        held.insert(
            key.to_string(),
            Held {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        self.check_available()?;
        let mut held = self.held.lock().await;

        match held.get(key) {
            Some(h) if &h.token == token => {
                let live = h.expires_at > Instant::now();
                held.remove(key);
                Ok(live)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_second_acquire_is_busy() {
        let locks = InMemoryLockManager::new();
        locks.acquire("lock:product:1", TTL).await.unwrap();

        let err = locks.acquire("lock:product:1", TTL).await.unwrap_err();
        assert!(matches!(err, LockError::Busy { key } if key == "lock:product:1"));

        // Disjoint keys are independent.
        assert!(locks.acquire("lock:product:2", TTL).await.is_ok());
        assert_eq!(locks.held_count().await, 2);
    }

    #[tokio::test]
    async fn test_release_frees_key() {
        let locks = InMemoryLockManager::new();
        let token = locks.acquire("k", TTL).await.unwrap();

        assert!(locks.release("k", &token).await.unwrap());
        assert!(!locks.is_held("k").await);
        assert!(locks.acquire("k", TTL).await.is_ok());
    }

    #[tokio::test]
    async fn test_release_with_foreign_token_is_ignored() {
        let locks = InMemoryLockManager::new();
        locks.acquire("k", TTL).await.unwrap();

        assert!(!locks.release("k", &LockToken::new()).await.unwrap());
        assert!(locks.is_held("k").await);
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let locks = InMemoryLockManager::new();
        let stale = locks
            .acquire("k", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!locks.is_held("k").await);

        let fresh = locks.acquire("k", TTL).await.unwrap();
        // The crashed holder's late release must not free the new holder.
        assert!(!locks.release("k", &stale).await.unwrap());
        assert!(locks.is_held("k").await);
        assert!(locks.release("k", &fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let locks = InMemoryLockManager::new();
        locks.set_unavailable(true);
        assert!(matches!(
            locks.acquire("k", TTL).await,
            Err(LockError::Backend(_))
        ));
    }
}
