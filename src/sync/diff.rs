//! Source/destination set difference.

use std::collections::HashSet;

use crate::storage::ObjectRecord;
use crate::sync::fingerprint::{fingerprint, Fingerprint};

/// Source records whose fingerprint is absent at the destination.
///
/// Built once per run from listings taken before any copy, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet {
    records: Vec<ObjectRecord>,
}

impl DiffSet {
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes a full copy of the set would move server-side.
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|record| record.size).sum()
    }
}

impl<'a> IntoIterator for &'a DiffSet {
    type Item = &'a ObjectRecord;
    type IntoIter = std::slice::Iter<'a, ObjectRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Fingerprint set of a listing.
pub fn fingerprints(records: &[ObjectRecord]) -> HashSet<Fingerprint> {
    records.iter().map(fingerprint).collect()
}

/// Compute the [`DiffSet`] in O(n + m). Order follows `source`.
pub fn diff(source: &[ObjectRecord], dest: &[ObjectRecord]) -> DiffSet {
    let present = fingerprints(dest);
    let records = source
        .iter()
        .filter(|record| !present.contains(&fingerprint(record)))
        .cloned()
        .collect();
    DiffSet { records }
}
