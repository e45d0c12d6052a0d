//! Exclude patterns for source listings.
//!
//! Glob patterns are matched against the key relative to the location prefix
//! and against its last segment, so `*.tmp` catches `a/b/c.tmp`.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{SyncError, SyncResult};
use crate::storage::ObjectRecord;

/// Compiled set of exclude globs. Empty by default.
#[derive(Debug, Clone)]
pub struct ExcludePatterns {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for ExcludePatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcludePatterns {
    pub fn new() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile `patterns`; blank entries are ignored.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> SyncResult<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list = Vec::new();

        for pattern in patterns.iter().map(|p| p.as_ref().trim()) {
            if pattern.is_empty() {
                continue;
            }
            let glob = Glob::new(pattern)
                .map_err(|e| SyncError::Config(format!("bad exclude pattern `{}`: {}", pattern, e)))?;
            builder.add(glob);
            pattern_list.push(pattern.to_string());
        }

        let glob_set = builder
            .build()
            .map_err(|e| SyncError::Config(format!("bad exclude patterns: {}", e)))?;

        Ok(Self {
            glob_set,
            patterns: pattern_list,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check a relative key against the set.
    pub fn is_excluded(&self, key: &str) -> bool {
        if self.glob_set.is_match(key) {
            return true;
        }
        match key.rsplit_once('/') {
            Some((_, name)) => self.glob_set.is_match(name),
            None => false,
        }
    }

    /// Drop excluded records, keeping order. Returns the kept records and the
    /// number removed.
    pub fn filter(&self, records: Vec<ObjectRecord>) -> (Vec<ObjectRecord>, usize) {
        if self.is_empty() {
            return (records, 0);
        }
        let before = records.len();
        let kept: Vec<ObjectRecord> = records
            .into_iter()
            .filter(|record| !self.is_excluded(&record.key))
            .collect();
        let excluded = before - kept.len();
        (kept, excluded)
    }
}
