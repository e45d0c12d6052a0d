// Property tests for diffing and sync runs

use proptest::collection::vec;
use proptest::prelude::*;

use bucketsync::storage::ObjectRecord;
use bucketsync::sync::diff::fingerprints;
use bucketsync::sync::{diff, fingerprint_of};

use crate::common::{buckets, engine};

fn record() -> impl Strategy<Value = ObjectRecord> {
    ("[a-d]{1,3}(/[a-d]{1,2})?", 0u64..4).prop_map(|(key, size)| ObjectRecord::new(key, size))
}

/// Flat keys only: nested keys are flattened at the destination.
fn flat_record() -> impl Strategy<Value = ObjectRecord> {
    ("[a-z]{1,6}", 0u64..1_000_000).prop_map(|(key, size)| ObjectRecord::new(key, size))
}

proptest! {
    #[test]
    fn prop_diff_empty_iff_subset(a in vec(record(), 0..20), b in vec(record(), 0..20)) {
        let subset = fingerprints(&a).is_subset(&fingerprints(&b));
        prop_assert_eq!(diff(&a, &b).is_empty(), subset);
    }

    #[test]
    fn prop_diff_is_ordered_subsequence(a in vec(record(), 0..20), b in vec(record(), 0..20)) {
        let set = diff(&a, &b);
        let mut remaining = a.iter();
        for entry in set.iter() {
            prop_assert!(remaining.any(|r| r == entry));
        }
        let present = fingerprints(&b);
        for entry in set.iter() {
            prop_assert!(!present.contains(&fingerprint_of(entry.size, &entry.key)));
        }
    }

    #[test]
    fn prop_diff_is_deterministic(a in vec(record(), 0..20), b in vec(record(), 0..20)) {
        let first = diff(&a, &b);
        let second = diff(&a, &b);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_fingerprint_depends_only_on_size_and_key(key in "[ -~]{0,40}", size in any::<u64>()) {
        prop_assert_eq!(fingerprint_of(size, &key), fingerprint_of(size, &key));
        prop_assert_ne!(fingerprint_of(size, &key), fingerprint_of(size ^ 1, &key));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_successful_sync_covers_source(
        source in vec(flat_record(), 0..12),
        dest in vec(flat_record(), 0..6),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let storage = buckets();

        for record in &source {
            storage.put("src", &record.key, record.size);
        }
        for record in &dest {
            storage.put("dst", &record.key, record.size);
        }

        let before = fingerprints(&storage.objects("src"));
        let report = runtime
            .block_on(engine(&storage).run("s3://src", "s3://dst"))
            .unwrap();

        prop_assert!(report.is_success());
        let after = fingerprints(&storage.objects("dst"));
        prop_assert!(before.is_subset(&after));
    }
}
