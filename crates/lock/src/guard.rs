//! Scoped ownership of a set of locks.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::LockError;
use crate::manager::{LockManager, LockToken};

/// A set of held locks, released together.
///
/// Call [`LockSet::release`] on every exit path. If the set is dropped
/// while still holding keys (a panic or a cancelled future), the release
/// is spawned onto the current runtime; failing that, the TTL frees them.
pub struct LockSet<M: LockManager + Clone + 'static> {
    manager: M,
    held: Vec<(String, LockToken)>,
}

impl<M: LockManager + Clone + 'static> LockSet<M> {
    /// Acquires every key in order, or none of them.
    ///
    /// On the first busy or failing key, the keys already taken are
    /// released before the error is returned.
    pub async fn acquire_all<I, K>(manager: &M, keys: I, ttl: Duration) -> Result<Self, LockError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut set = Self {
            manager: manager.clone(),
            held: Vec::new(),
        };

        for key in keys {
            let key = key.into();
            match manager.acquire(&key, ttl).await {
                Ok(token) => {
                    debug!(key = %key, "Lock acquired");
                    set.held.push((key, token));
                }
                Err(e) => {
                    set.release().await;
                    return Err(e);
                }
            }
        }

        Ok(set)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Releases every held key. Failures are logged, not returned.
    pub async fn release(mut self) {
        let held = std::mem::take(&mut self.held);
        release_keys(&self.manager, held).await;
    }
}

async fn release_keys<M: LockManager>(manager: &M, held: Vec<(String, LockToken)>) {
    for (key, token) in held.into_iter().rev() {
        match manager.release(&key, &token).await {
            Ok(true) => debug!(key = %key, "Lock released"),
            Ok(false) => warn!(key = %key, "Lock expired before release"),
            Err(e) => warn!(key = %key, error = %e, "Failed to release lock"),
        }
    }
}

impl<M: LockManager + Clone + 'static> Drop for LockSet<M> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let held = std::mem::take(&mut self.held);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.manager.clone();
                handle.spawn(async move { release_keys(&manager, held).await });
            }
            Err(_) => {
                warn!(
                    count = held.len(),
                    "No runtime to release locks; waiting for TTL expiry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLockManager;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_acquire_all_and_release() {
        let locks = InMemoryLockManager::new();
        let set = LockSet::acquire_all(&locks, ["a", "b", "c"], TTL)
            .await
            .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(locks.held_count().await, 3);

        set.release().await;
        assert_eq!(locks.held_count().await, 0);
    }

    #[tokio::test]
    async fn test_partial_acquire_is_rolled_back() {
        let locks = InMemoryLockManager::new();
        let other = locks.acquire("c", TTL).await.unwrap();

        let err = LockSet::acquire_all(&locks, ["a", "b", "c"], TTL)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LockError::Busy { key } if key == "c"));

        assert!(!locks.is_held("a").await);
        assert!(!locks.is_held("b").await);
        assert!(locks.release("c", &other).await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_releases_in_background() {
        let locks = InMemoryLockManager::new();
        {
            let _set = LockSet::acquire_all(&locks, ["a"], TTL).await.unwrap();
        }
        // Let the spawned release run.
        for _ in 0..10 {
            if !locks.is_held("a").await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!locks.is_held("a").await);
    }
}
