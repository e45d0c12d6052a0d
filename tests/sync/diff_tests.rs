// Tests for fingerprint diffing

use bucketsync::storage::ObjectRecord;
use bucketsync::sync::diff::fingerprints;
use bucketsync::sync::{diff, fingerprint, fingerprint_of};

fn records(entries: &[(&str, u64)]) -> Vec<ObjectRecord> {
    entries
        .iter()
        .map(|(key, size)| ObjectRecord::new(*key, *size))
        .collect()
}

#[test]
fn test_empty_destination_diffs_everything() {
    let source = records(&[("a.txt", 100), ("b.txt", 200)]);
    let set = diff(&source, &[]);

    assert_eq!(set.len(), 2);
    assert_eq!(set.records(), source.as_slice());
    assert_eq!(set.total_bytes(), 300);
}

#[test]
fn test_key_is_part_of_identity() {
    let source = records(&[("a.txt", 100)]);
    let dest = records(&[("old/a.txt", 100)]);

    assert_ne!(fingerprint(&source[0]), fingerprint(&dest[0]));
    let set = diff(&source, &dest);
    assert_eq!(set.records(), source.as_slice());
}

#[test]
fn test_size_is_part_of_identity() {
    let set = diff(&records(&[("a.txt", 101)]), &records(&[("a.txt", 100)]));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_same_size_content_change_is_invisible() {
    // Only size and key feed the fingerprint, so rewritten content of equal
    // length never shows up in the diff.
    let before = ObjectRecord::new("report.csv", 4096);
    let after = ObjectRecord::new("report.csv", 4096);
    assert!(diff(&[after], &[before]).is_empty());
}

#[test]
fn test_destination_extras_are_ignored() {
    let source = records(&[("a.txt", 1)]);
    let dest = records(&[("a.txt", 1), ("z.txt", 9), ("y.txt", 8)]);
    assert!(diff(&source, &dest).is_empty());
}

#[test]
fn test_keeps_source_order() {
    let source = records(&[("c", 3), ("a", 1), ("d", 4), ("b", 2)]);
    let dest = records(&[("d", 4)]);

    let set = diff(&source, &dest);
    let keys: Vec<&str> = set.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["c", "a", "b"]);
}

#[test]
fn test_fingerprint_format() {
    let fp = fingerprint_of(100, "a.txt");
    assert!(fp.as_str().starts_with("md5:"));
    assert_eq!(fp.as_str().len(), "md5:".len() + 32);
    assert_eq!(fp, fingerprint(&ObjectRecord::new("a.txt", 100)));
}

#[test]
fn test_fingerprint_set_ignores_listing_order() {
    let forward = records(&[("a", 1), ("b", 2), ("c", 3)]);
    let mut backward = forward.clone();
    backward.reverse();
    assert_eq!(fingerprints(&forward), fingerprints(&backward));
}
