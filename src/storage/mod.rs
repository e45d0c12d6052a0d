pub mod backend;
pub mod memory;
pub mod s3;
pub mod types;

pub use backend::{ObjectStorage, StorageError, StorageProvider, StorageResult, VerifyPolicy};
pub use memory::{MemoryProvider, MemoryStorage};
pub use s3::{S3Provider, S3Storage};
pub use types::*;
