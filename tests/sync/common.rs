// Shared fixtures for sync tests

use std::sync::Arc;

use bucketsync::config::SyncConfig;
use bucketsync::storage::{MemoryProvider, MemoryStorage};
use bucketsync::sync::SyncEngine;

/// Two empty buckets, `src` and `dst`, in different regions.
pub fn buckets() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.create_bucket("src", "us-east-1");
    storage.create_bucket("dst", "eu-west-1");
    storage
}

/// Config with near-instant verification polling.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        verify_interval_ms: 1,
        verify_max_attempts: 3,
        max_concurrency: 4,
        ..SyncConfig::default()
    }
}

pub fn engine(storage: &MemoryStorage) -> SyncEngine {
    engine_with(storage, fast_config())
}

pub fn engine_with(storage: &MemoryStorage, config: SyncConfig) -> SyncEngine {
    SyncEngine::new(Arc::new(MemoryProvider::new(storage.clone())), config)
}
