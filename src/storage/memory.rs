//! In-memory storage capability.
//!
//! Buckets live in a shared map so every handle returned by
//! [`MemoryProvider::connect`] observes the same objects. Failure injection,
//! delayed visibility and call counters make it the backend for tests and for
//! rehearsing a run against fixture listings.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::storage::backend::{ObjectStorage, StorageError, StorageProvider, StorageResult};
use crate::storage::types::{ListPage, ObjectRecord};

#[derive(Debug, Default)]
struct MemoryState {
    buckets: HashMap<String, BTreeMap<String, u64>>,
    regions: HashMap<String, String>,
    failing_lists: HashSet<String>,
    failing_copies: HashSet<String>,
    failing_exists: HashSet<(String, String)>,
    /// Remaining `exists` calls that report a present object as missing.
    hidden_checks: HashMap<(String, String), u32>,
    connected_regions: Vec<String>,
}

/// Call counters, updated on every capability invocation.
#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    copy: AtomicUsize,
    exists: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Shared in-memory object store.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<Counters>,
    page_size: usize,
    copy_delay: Option<Duration>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            counters: Arc::new(Counters::default()),
            page_size: 1000,
            copy_delay: None,
        }
    }

    /// Cap the number of keys returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every copy take at least `delay`.
    pub fn with_copy_delay(mut self, delay: Duration) -> Self {
        self.copy_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens in a failed test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create_bucket(&self, scope: &str, region: &str) {
        let mut state = self.lock();
        state.buckets.entry(scope.to_string()).or_default();
        state.regions.insert(scope.to_string(), region.to_string());
    }

    pub fn put(&self, scope: &str, key: &str, size: u64) {
        self.lock()
            .buckets
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), size);
    }

    /// Objects of a bucket in key order. Keys are full storage keys.
    pub fn objects(&self, scope: &str) -> Vec<ObjectRecord> {
        self.lock()
            .buckets
            .get(scope)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, size)| ObjectRecord::new(key.clone(), *size))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, scope: &str, key: &str) -> bool {
        self.lock()
            .buckets
            .get(scope)
            .is_some_and(|objects| objects.contains_key(key))
    }

    /// Forget the region of `scope` so region discovery fails.
    pub fn forget_region(&self, scope: &str) {
        self.lock().regions.remove(scope);
    }

    pub fn fail_list(&self, scope: &str) {
        self.lock().failing_lists.insert(scope.to_string());
    }

    /// Reject copies whose source key is `src_key`.
    pub fn fail_copy(&self, src_key: &str) {
        self.lock().failing_copies.insert(src_key.to_string());
    }

    /// Fail existence checks for `key` in `scope` with a transport error.
    pub fn fail_exists(&self, scope: &str, key: &str) {
        self.lock()
            .failing_exists
            .insert((scope.to_string(), key.to_string()));
    }

    /// Report `key` as missing for the next `checks` existence checks.
    pub fn hide(&self, scope: &str, key: &str, checks: u32) {
        self.lock()
            .hidden_checks
            .insert((scope.to_string(), key.to_string()), checks);
    }

    pub fn list_calls(&self) -> usize {
        self.counters.list.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.counters.copy.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.counters.exists.load(Ordering::SeqCst)
    }

    /// Highest number of copies observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Regions passed to `connect`, in call order.
    pub fn connected_regions(&self) -> Vec<String> {
        self.lock().connected_regions.clone()
    }
}

struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn list_page(
        &self,
        scope: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();

        if state.failing_lists.contains(scope) {
            return Err(StorageError::Request {
                operation: "ListObjectsV2",
                message: format!("injected listing failure for {}", scope),
            });
        }
        let objects = state
            .buckets
            .get(scope)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", scope)))?;

        let limit = self.page_size.min(max_keys.max(1) as usize);
        let mut page: Vec<ObjectRecord> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.as_deref().map_or(true, |after| key.as_str() > after))
            .take(limit + 1)
            .map(|(key, size)| ObjectRecord::new(key.clone(), *size))
            .collect();

        let continuation = if page.len() > limit {
            page.truncate(limit);
            page.last().map(|record| record.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            continuation,
        })
    }

    async fn copy_object(
        &self,
        src_scope: &str,
        src_key: &str,
        dst_scope: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        self.counters.copy.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);

        if let Some(delay) = self.copy_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.failing_copies.contains(src_key) {
            return Err(StorageError::Request {
                operation: "CopyObject",
                message: format!("injected copy failure for {}", src_key),
            });
        }

        let size = state
            .buckets
            .get(src_scope)
            .and_then(|objects| objects.get(src_key))
            .copied()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", src_scope, src_key)))?;

        state
            .buckets
            .get_mut(dst_scope)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", dst_scope)))?
            .insert(dst_key.to_string(), size);

        Ok(())
    }

    async fn exists(&self, scope: &str, key: &str) -> StorageResult<bool> {
        self.counters.exists.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();

        let slot = (scope.to_string(), key.to_string());
        if state.failing_exists.contains(&slot) {
            return Err(StorageError::Request {
                operation: "HeadObject",
                message: format!("injected HeadObject failure for {}/{}", scope, key),
            });
        }

        if let Some(remaining) = state.hidden_checks.get_mut(&slot) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }

        Ok(state
            .buckets
            .get(scope)
            .is_some_and(|objects| objects.contains_key(key)))
    }
}

/// Provider handing out handles onto one [`MemoryStorage`].
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    storage: MemoryStorage,
}

impl MemoryProvider {
    pub fn new(storage: MemoryStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    async fn resolve_region(&self, scope: &str) -> StorageResult<String> {
        self.storage
            .lock()
            .regions
            .get(scope)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("region of bucket {}", scope)))
    }

    async fn connect(&self, region: &str) -> StorageResult<Arc<dyn ObjectStorage>> {
        self.storage
            .lock()
            .connected_regions
            .push(region.to_string());
        Ok(Arc::new(self.storage.clone()))
    }
}
