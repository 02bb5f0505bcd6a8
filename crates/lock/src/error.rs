//! Lock manager error types.

use thiserror::Error;

/// Errors that can occur when acquiring or releasing a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is held by someone else.
    #[error("Lock busy: {key}")]
    Busy { key: String },

    /// The lock backend could not be reached.
    #[error("Lock backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        LockError::Backend(err.to_string())
    }
}
