// Tests for complete sync runs

use bucketsync::config::SyncConfig;
use bucketsync::error::SyncError;
use bucketsync::storage::ObjectRecord;
use bucketsync::sync::diff::fingerprints;
use bucketsync::sync::{SyncOutcome, TaskStatus};

use crate::common::{buckets, engine, engine_with, fast_config};

#[tokio::test]
async fn test_copies_into_empty_destination() {
    let storage = buckets();
    storage.put("src", "a.txt", 100);
    storage.put("src", "b.txt", 200);

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.diff_size, 2);
    assert_eq!(report.outcome(), SyncOutcome::Completed);
    assert_eq!(report.bytes_copied, 300);
    assert_eq!(
        storage.objects("dst"),
        vec![ObjectRecord::new("a.txt", 100), ObjectRecord::new("b.txt", 200)]
    );
    assert_eq!(fingerprints(&storage.objects("dst")), fingerprints(&storage.objects("src")));
}

#[tokio::test]
async fn test_same_size_under_other_key_is_copied() {
    let storage = buckets();
    storage.put("src", "a.txt", 100);
    storage.put("dst", "old/a.txt", 100);

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.copied, vec!["a.txt".to_string()]);
    assert!(storage.contains("dst", "a.txt"));
    assert!(storage.contains("dst", "old/a.txt"));
}

#[tokio::test]
async fn test_one_failed_copy_does_not_stop_others() {
    let storage = buckets();
    storage.put("src", "a.txt", 100);
    storage.put("src", "b.txt", 200);
    storage.fail_copy("b.txt");

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcome(), SyncOutcome::CompletedWithFailures(1));

    let failure = &report.failures[0];
    assert_eq!(failure.key, "b.txt");
    assert_eq!(failure.stage, TaskStatus::Copying);
    assert!(matches!(failure.error, SyncError::Copy { .. }));

    let summary = report.render();
    assert!(summary.contains("b.txt"));
    assert!(summary.contains("injected copy failure"));
    assert!(storage.contains("dst", "a.txt"));
}

#[tokio::test]
async fn test_identical_content_makes_no_copy_calls() {
    let storage = buckets();
    for (key, size) in [("a.txt", 1), ("b.txt", 2)] {
        storage.put("src", key, size);
        storage.put("dst", key, size);
    }

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.outcome(), SyncOutcome::NothingToDo);
    assert_eq!(report.render(), "Content is identical\n");
    assert_eq!(storage.copy_calls(), 0);
    assert_eq!(storage.exists_calls(), 0);
}

#[tokio::test]
async fn test_second_run_has_nothing_to_do() {
    let storage = buckets();
    for i in 0..5 {
        storage.put("src", &format!("file-{}.bin", i), i * 10);
    }

    let first = engine(&storage).run("s3://src", "s3://dst").await.unwrap();
    assert_eq!(first.succeeded(), 5);

    let second = engine(&storage).run("s3://src", "s3://dst").await.unwrap();
    assert_eq!(second.outcome(), SyncOutcome::NothingToDo);
    assert_eq!(storage.copy_calls(), 5);
}

#[tokio::test]
async fn test_listing_follows_every_page() {
    let storage = buckets().with_page_size(2);
    for i in 0..7 {
        storage.put("src", &format!("k{}", i), 1);
    }
    let config = SyncConfig {
        list_page_size: 2,
        ..fast_config()
    };

    let report = engine_with(&storage, config).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.succeeded(), 7);
    // Four source pages plus one empty destination page.
    assert_eq!(storage.list_calls(), 5);
}

#[tokio::test]
async fn test_source_listing_failure_is_fatal() {
    let storage = buckets();
    storage.put("src", "a.txt", 1);
    storage.fail_list("src");

    let err = engine(&storage).run("s3://src", "s3://dst").await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::Listing { .. }));
    assert_eq!(storage.copy_calls(), 0);
}

#[tokio::test]
async fn test_malformed_destination_is_fatal_before_any_call() {
    let storage = buckets();
    storage.put("src", "a.txt", 1);

    let err = engine(&storage).run("s3://src", "dst/photos").await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidLocation { .. }));
    assert!(storage.connected_regions().is_empty());
    assert_eq!(storage.list_calls(), 0);
}

#[tokio::test]
async fn test_region_failure_falls_back() {
    let storage = buckets();
    storage.forget_region("dst");
    storage.put("src", "a.txt", 1);
    let config = SyncConfig {
        fallback_region: "ap-south-1".to_string(),
        ..fast_config()
    };

    let report = engine_with(&storage, config).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(
        storage.connected_regions(),
        vec!["us-east-1".to_string(), "ap-south-1".to_string()]
    );
}

#[tokio::test]
async fn test_prefix_to_prefix_flattens_keys() {
    let storage = buckets();
    storage.put("src", "photos/2024/a.jpg", 10);
    storage.put("src", "photos/2024/raw/b.cr2", 20);
    storage.put("src", "videos/c.mp4", 30);

    let report = engine(&storage)
        .run("s3://src/photos/2024", "s3://dst/backup")
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert!(storage.contains("dst", "backup/a.jpg"));
    assert!(storage.contains("dst", "backup/b.cr2"));
    assert!(!storage.contains("dst", "backup/c.mp4"));
}

#[tokio::test]
async fn test_late_visibility_is_tolerated() {
    let storage = buckets();
    storage.put("src", "a.txt", 1);
    storage.hide("dst", "a.txt", 2);

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(storage.exists_calls(), 3);
}

#[tokio::test]
async fn test_never_visible_fails_verification() {
    let storage = buckets();
    storage.put("src", "a.txt", 1);
    storage.put("src", "b.txt", 2);
    storage.hide("dst", "a.txt", u32::MAX);

    let report = engine(&storage).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures[0].key, "a.txt");
    assert_eq!(report.failures[0].stage, TaskStatus::Verifying);
    assert!(matches!(report.failures[0].error, SyncError::Verification { .. }));
}

#[tokio::test]
async fn test_dry_run_plans_without_copying() {
    let storage = buckets();
    storage.put("src", "a.txt", 1024);
    storage.put("src", "b.log", 1);
    let config = SyncConfig {
        dry_run: true,
        exclude: vec!["*.log".to_string()],
        ..fast_config()
    };

    let report = engine_with(&storage, config).run("s3://src", "s3://dst").await.unwrap();

    assert_eq!(report.outcome(), SyncOutcome::DryRun(1));
    assert_eq!(report.excluded, 1);
    assert_eq!(storage.copy_calls(), 0);
    assert!(report.render().contains("a.txt (1 KiB)"));
}

#[tokio::test]
async fn test_nested_source_keys_are_copied_again_each_run() {
    let storage = buckets();
    storage.put("src", "top.txt", 1);
    storage.put("src", "sub/a.txt", 2);

    let first = engine(&storage).run("s3://src", "s3://dst").await.unwrap();
    assert_eq!(first.succeeded(), 2);
    assert!(storage.contains("dst", "a.txt"));
    assert!(!storage.contains("dst", "sub/a.txt"));

    // The destination holds `a.txt`, whose fingerprint differs from the
    // source's `sub/a.txt`, so only the nested key is planned again.
    let second = engine(&storage).run("s3://src", "s3://dst").await.unwrap();
    assert_eq!(second.outcome(), SyncOutcome::Completed);
    assert_eq!(second.copied, vec!["sub/a.txt".to_string()]);
    assert_eq!(storage.copy_calls(), 3);
}
