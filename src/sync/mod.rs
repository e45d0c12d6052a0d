//! One-way bucket sync.
//!
//! Locations are resolved and listed, source objects missing from the
//! destination are found by fingerprint and copied server-side with
//! existence verification.

pub mod copy;
pub mod diff;
pub mod engine;
pub mod exclude;
pub mod fingerprint;
pub mod lister;
pub mod location;
pub mod report;
pub mod throttle;

pub use copy::{CopyFailure, CopyOptions, CopyOrchestrator, CopyTask, TaskStatus};
pub use diff::{diff, DiffSet};
pub use engine::{SyncEngine, SyncPhase, SyncProgress};
pub use exclude::ExcludePatterns;
pub use fingerprint::{fingerprint, fingerprint_of, Fingerprint};
pub use lister::ObjectLister;
pub use location::{CredentialProfile, LocationResolver, LocationUri, StorageLocation};
pub use report::{SyncOutcome, SyncReport};
pub use throttle::RequestLimiter;
