//! Redis-backed lock manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::error::LockError;
use crate::manager::{LockManager, LockToken};

/// Deletes the key only if it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Lock manager shared by every service instance through Redis.
///
/// Acquire is `SET key token NX PX ttl`; release is a compare-and-delete
/// script so a holder whose key expired cannot free someone else's lock.
#[derive(Clone)]
pub struct RedisLockManager {
    conn: ConnectionManager,
    release_script: Arc<Script>,
}

impl RedisLockManager {
    /// Connects to Redis at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release_script: Arc::new(Script::new(RELEASE_SCRIPT)),
        }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken, LockError> {
        let token = LockToken::new();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        match reply {
            Some(_) => Ok(token),
            None => Err(LockError::Busy {
                key: key.to_string(),
            }),
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }
}
