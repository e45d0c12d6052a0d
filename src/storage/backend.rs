//! Storage capability consumed by the sync core.
//!
//! Implementations must be safe for concurrent invocation: the copy phase
//! shares one destination handle across every in-flight task without locking.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::storage::types::ListPage;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Bounded wait used to confirm a copied object is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Delay between existence checks.
    pub poll_interval: Duration,
    /// Checks before giving up.
    pub max_attempts: u32,
}

impl VerifyPolicy {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Upper bound on the time spent waiting.
    pub fn max_wait(&self) -> Duration {
        self.poll_interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for VerifyPolicy {
    // Same bounds as the S3 ObjectExists waiter.
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 20)
    }
}

/// Object operations against one storage endpoint.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch one page of objects under `prefix`. Keys in the page are full keys.
    async fn list_page(
        &self,
        scope: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage>;

    /// Server-side copy; no object bytes pass through this process.
    async fn copy_object(
        &self,
        src_scope: &str,
        src_key: &str,
        dst_scope: &str,
        dst_key: &str,
    ) -> StorageResult<()>;

    /// Existence check. A missing object is `Ok(false)`.
    async fn exists(&self, scope: &str, key: &str) -> StorageResult<bool>;

    /// Wait until `key` is visible, probing at most `policy.max_attempts` times.
    ///
    /// Returns `Ok(false)` when the object is still missing after the last check.
    async fn wait_until_exists(
        &self,
        scope: &str,
        key: &str,
        policy: &VerifyPolicy,
    ) -> StorageResult<bool> {
        for attempt in 0..policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(policy.poll_interval).await;
            }
            if self.exists(scope, key).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Factory for storage handles, bound to one set of credentials.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Discover the region serving `scope`.
    async fn resolve_region(&self, scope: &str) -> StorageResult<String>;

    /// Build a client handle for `region`.
    async fn connect(&self, region: &str) -> StorageResult<Arc<dyn ObjectStorage>>;
}
