//! Full listing of a location.

use crate::error::{SyncError, SyncResult};
use crate::storage::ObjectRecord;
use crate::sync::location::StorageLocation;

/// Default page size, the ListObjectsV2 maximum.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Enumerates every object under a location's prefix.
#[derive(Debug, Clone, Copy)]
pub struct ObjectLister {
    page_size: i32,
}

impl Default for ObjectLister {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ObjectLister {
    pub fn new(page_size: i32) -> Self {
        Self {
            page_size: page_size.clamp(1, DEFAULT_PAGE_SIZE),
        }
    }

    /// Follow continuation tokens until the last page.
    ///
    /// Returned keys are relative to the location prefix, in listing order.
    /// Directory placeholders (keys ending in `/`) are skipped. Any page
    /// failure fails the whole listing.
    pub async fn list(&self, location: &StorageLocation) -> SyncResult<Vec<ObjectRecord>> {
        let mut records = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = location
                .storage()
                .list_page(location.scope(), location.prefix(), continuation.take(), self.page_size)
                .await
                .map_err(|source| SyncError::Listing {
                    scope: location.scope().to_string(),
                    prefix: location.prefix().to_string(),
                    source,
                })?;
            pages += 1;

            records.extend(page.objects.into_iter().filter_map(|object| {
                let relative = object.key.strip_prefix(location.prefix())?;
                if relative.is_empty() || relative.ends_with('/') {
                    return None;
                }
                Some(ObjectRecord::new(relative, object.size))
            }));

            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::info!(
            location = %location.uri(),
            objects = records.len(),
            pages,
            "listing complete"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryProvider, MemoryStorage};
    use crate::sync::location::LocationResolver;
    use std::sync::Arc;

    async fn location(storage: &MemoryStorage, uri: &str) -> StorageLocation {
        LocationResolver::new(Arc::new(MemoryProvider::new(storage.clone())), "us-east-1")
            .resolve(uri)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lists_every_page() {
        let storage = MemoryStorage::new().with_page_size(3);
        storage.create_bucket("src", "us-east-1");
        for i in 0..10 {
            storage.put("src", &format!("data/file-{:02}.bin", i), i);
        }

        let records = ObjectLister::default()
            .list(&location(&storage, "s3://src/data").await)
            .await
            .unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records[0], ObjectRecord::new("file-00.bin", 0));
        assert_eq!(records[9], ObjectRecord::new("file-09.bin", 9));
        assert_eq!(storage.list_calls(), 4);
    }

    #[tokio::test]
    async fn test_skips_placeholders_and_siblings() {
        let storage = MemoryStorage::new();
        storage.create_bucket("src", "us-east-1");
        storage.put("src", "data/", 0);
        storage.put("src", "data/sub/", 0);
        storage.put("src", "data/sub/x.txt", 5);
        storage.put("src", "data2/y.txt", 7);

        let records = ObjectLister::default()
            .list(&location(&storage, "s3://src/data").await)
            .await
            .unwrap();

        assert_eq!(records, vec![ObjectRecord::new("sub/x.txt", 5)]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let storage = MemoryStorage::new();
        storage.create_bucket("src", "us-east-1");
        storage.fail_list("src");

        let err = ObjectLister::default()
            .list(&location(&storage, "s3://src/data").await)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Listing { .. }));
        assert!(err.is_fatal());
    }
}
