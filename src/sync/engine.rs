//! Sync engine for one-way bucket synchronization.
//!
//! A run resolves both locations, lists both of them in full, diffs the
//! listings by fingerprint and hands the diff to the copy orchestrator.
//! Nothing is written to the destination before both listings succeed.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::storage::StorageProvider;
use crate::sync::copy::CopyOrchestrator;
use crate::sync::diff::{diff, DiffSet};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::lister::ObjectLister;
use crate::sync::location::{LocationResolver, LocationUri, StorageLocation};
use crate::sync::report::SyncReport;

/// Current sync phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Resolving,
    Listing,
    Diffing,
    Copying,
    Complete,
}

/// Progress update for a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    Phase(SyncPhase),
    /// Diff computed; `objects` entries totalling `bytes` will be copied.
    DiffReady { objects: usize, bytes: u64 },
    TaskStarted { from: String, to: String },
    TaskCompleted { key: String, size: u64 },
    TaskFailed { key: String, reason: String },
}

/// Runs a complete sync from a source location to a destination location.
pub struct SyncEngine {
    provider: Arc<dyn StorageProvider>,
    config: SyncConfig,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl SyncEngine {
    pub fn new(provider: Arc<dyn StorageProvider>, config: SyncConfig) -> Self {
        Self {
            provider,
            config,
            progress_tx: None,
        }
    }

    /// Report progress events on `progress_tx`.
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn send_progress(&self, progress: SyncProgress) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }

    /// Sync every object under `source_uri` that the destination lacks.
    ///
    /// Malformed URIs, bad configuration and listing failures are returned as
    /// errors. Per-object copy failures end up in the report instead.
    pub async fn run(&self, source_uri: &str, dest_uri: &str) -> SyncResult<SyncReport> {
        let started = std::time::Instant::now();

        // Reject bad input before any storage call.
        LocationUri::parse(source_uri)?;
        LocationUri::parse(dest_uri)?;
        self.config
            .validate()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let exclude = self.config.exclude_patterns()?;

        self.send_progress(SyncProgress::Phase(SyncPhase::Resolving)).await;
        let resolver = LocationResolver::new(Arc::clone(&self.provider), &self.config.fallback_region);
        let source = resolver.resolve(source_uri).await?;
        let dest = resolver.resolve(dest_uri).await?;
        tracing::info!(
            source = %source.uri(),
            source_region = source.region(),
            destination = %dest.uri(),
            destination_region = dest.region(),
            "locations resolved"
        );

        self.send_progress(SyncProgress::Phase(SyncPhase::Listing)).await;
        let (diff_set, excluded) = self.plan(&source, &dest, &exclude).await?;

        self.send_progress(SyncProgress::DiffReady {
            objects: diff_set.len(),
            bytes: diff_set.total_bytes(),
        })
        .await;

        let mut report = if self.config.dry_run {
            tracing::info!(objects = diff_set.len(), "dry run, skipping copy phase");
            SyncReport::dry_run(diff_set.records().to_vec())
        } else {
            self.send_progress(SyncProgress::Phase(SyncPhase::Copying)).await;
            let mut orchestrator = CopyOrchestrator::new(self.config.copy_options());
            if let Some(ref tx) = self.progress_tx {
                orchestrator = orchestrator.with_progress(tx.clone());
            }
            orchestrator.sync(&diff_set, &source, &dest).await
        };

        report.excluded = excluded;
        report.duration = started.elapsed();
        self.send_progress(SyncProgress::Phase(SyncPhase::Complete)).await;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            excluded,
            "sync finished"
        );
        Ok(report)
    }

    /// List both locations and compute what to copy.
    ///
    /// Returns the diff and the number of source objects dropped by exclude
    /// patterns.
    pub async fn plan(
        &self,
        source: &StorageLocation,
        dest: &StorageLocation,
        exclude: &ExcludePatterns,
    ) -> SyncResult<(DiffSet, usize)> {
        let lister = ObjectLister::new(self.config.list_page_size);
        let (source_objects, dest_objects) =
            tokio::try_join!(lister.list(source), lister.list(dest))?;

        self.send_progress(SyncProgress::Phase(SyncPhase::Diffing)).await;
        let (source_objects, excluded) = exclude.filter(source_objects);
        if excluded > 0 {
            tracing::info!(excluded, "source objects excluded by pattern");
        }

        let diff_set = diff(&source_objects, &dest_objects);
        tracing::info!(
            source = source_objects.len(),
            destination = dest_objects.len(),
            to_copy = diff_set.len(),
            "diff computed"
        );
        Ok((diff_set, excluded))
    }
}
