//! Object identity tokens.
//!
//! A fingerprint is derived from an object's size and relative key only. It is
//! not a content hash: two objects with the same key and size but different
//! bytes share a fingerprint, so in-place edits that keep the size are never
//! picked up by a sync run.

use md5::{Digest, Md5};
use std::fmt;

use crate::storage::ObjectRecord;

/// Deterministic identity token, rendered as `md5:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of `(size, key)`.
///
/// The digest input is the size as 8 big-endian bytes followed by the key bytes.
pub fn fingerprint_of(size: u64, key: &str) -> Fingerprint {
    let mut hasher = Md5::new();
    hasher.update(size.to_be_bytes());
    hasher.update(key.as_bytes());
    Fingerprint(format!("md5:{:x}", hasher.finalize()))
}

pub fn fingerprint(record: &ObjectRecord) -> Fingerprint {
    fingerprint_of(record.size, &record.key)
}
