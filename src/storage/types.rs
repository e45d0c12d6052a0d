use humansize::{format_size, BINARY};
use serde::{Deserialize, Serialize};

/// A listed object. `key` is relative to the location prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
}

impl ObjectRecord {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Last path segment of the key.
    pub fn basename(&self) -> &str {
        let trimmed = self.key.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    pub fn format_size(&self) -> String {
        format_size(self.size, BINARY)
    }
}

/// One page of a listing as returned by the storage capability.
///
/// Keys are full storage keys (prefix included). `continuation` is `None`
/// on the last page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectRecord>,
    pub continuation: Option<String>,
}

impl ListPage {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(ObjectRecord::new("a.txt", 1).basename(), "a.txt");
        assert_eq!(ObjectRecord::new("deep/er/b.txt", 1).basename(), "b.txt");
        assert_eq!(ObjectRecord::new("", 0).basename(), "");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(ObjectRecord::new("a", 512).format_size(), "512 B");
        assert_eq!(ObjectRecord::new("a", 2048).format_size(), "2 KiB");
    }
}
