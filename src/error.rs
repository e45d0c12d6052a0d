//! Error taxonomy for sync runs.
//!
//! Run-fatal errors (`InvalidLocation`, `Listing`) abort before any copy is
//! issued. Per-object errors (`Copy`, `Verification`, `TaskTimeout`,
//! `RunDeadline`, `TaskAborted`) are recorded on the failed task and never stop sibling work.
//! `RegionResolution` is only ever logged; the location falls back to a default.

use std::time::Duration;
use thiserror::Error;

use crate::storage::StorageError;

/// Main error type for the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed location URI.
    #[error("invalid location `{uri}`: {reason}")]
    InvalidLocation { uri: String, reason: String },

    /// Region discovery failed for a bucket.
    #[error("unable to find region for bucket `{scope}`: {source}")]
    RegionResolution {
        scope: String,
        #[source]
        source: StorageError,
    },

    /// A location could not be fully listed.
    #[error("failed to list s3://{scope}/{prefix}: {source}")]
    Listing {
        scope: String,
        prefix: String,
        #[source]
        source: StorageError,
    },

    /// Server-side copy was rejected.
    #[error("failed to copy {from} --> {to}: {source}")]
    Copy {
        from: String,
        to: String,
        #[source]
        source: StorageError,
    },

    /// Copied object never became visible, or the existence check failed.
    #[error("failed to ensure {key} exists: {reason}")]
    Verification { key: String, reason: String },

    /// A single copy task ran past its time budget.
    #[error("copy of {key} timed out after {timeout:?}")]
    TaskTimeout { key: String, timeout: Duration },

    /// The run deadline passed before the task could finish.
    #[error("run deadline of {deadline:?} reached before {key} finished")]
    RunDeadline { key: String, deadline: Duration },

    /// The task panicked or was cancelled by the runtime.
    #[error("copy task for {key} aborted: {reason}")]
    TaskAborted { key: String, reason: String },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidLocation { .. } | SyncError::Listing { .. } | SyncError::Config(_)
        )
    }

    pub(crate) fn invalid_location(uri: &str, reason: impl Into<String>) -> Self {
        SyncError::InvalidLocation {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
