//! Copy orchestration.
//!
//! Every [`DiffSet`] entry becomes a [`CopyTask`] that walks
//! `Pending -> Copying -> Verifying -> Completed`, or ends in `Failed`. Tasks
//! run on the tokio runtime with at most `max_concurrency` in flight and the
//! orchestrator joins on all of them before building the report. A failed
//! task never cancels its siblings.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::SyncError;
use crate::storage::{ObjectRecord, VerifyPolicy};
use crate::sync::diff::DiffSet;
use crate::sync::engine::SyncProgress;
use crate::sync::location::StorageLocation;
use crate::sync::report::SyncReport;
use crate::sync::throttle::RequestLimiter;

/// Lifecycle of a single copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Copying,
    Verifying,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One object to copy.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub record: ObjectRecord,
    /// Full key at the destination: the destination prefix joined with the
    /// basename of the source key. Source sub-paths are flattened.
    pub destination_key: String,
    status: TaskStatus,
}

impl CopyTask {
    pub fn new(record: ObjectRecord, dest: &StorageLocation) -> Self {
        let destination_key = dest.object_key(record.basename());
        Self {
            record,
            destination_key,
            status: TaskStatus::Pending,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

/// A task that ended in `Failed`.
#[derive(Debug)]
pub struct CopyFailure {
    /// Source key, relative to the source prefix.
    pub key: String,
    pub destination_key: String,
    /// State the task was in when it failed.
    pub stage: TaskStatus,
    pub error: SyncError,
}

/// Tuning for the copy phase.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub max_concurrency: usize,
    pub task_timeout: Duration,
    /// Budget for the whole copy phase; `None` means no deadline.
    pub run_deadline: Option<Duration>,
    pub verify: VerifyPolicy,
    pub limiter: RequestLimiter,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            task_timeout: Duration::from_secs(300),
            run_deadline: None,
            verify: VerifyPolicy::default(),
            limiter: RequestLimiter::unlimited(),
        }
    }
}

/// Worker pool size used when none is configured.
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 4).max(1)
}

struct TaskContext {
    source: StorageLocation,
    dest: StorageLocation,
    options: CopyOptions,
    run_deadline: Option<Instant>,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl TaskContext {
    async fn send_progress(&self, progress: SyncProgress) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }

    /// Drive one task to a terminal state.
    async fn run(&self, mut task: CopyTask) -> Result<CopyTask, CopyFailure> {
        let now = Instant::now();
        if let Some(deadline) = self.run_deadline {
            if now >= deadline {
                let error = self.deadline_error(&task);
                return Err(self.fail(task, error).await);
            }
        }

        let task_limit = now + self.options.task_timeout;
        let (limit, run_bound) = match self.run_deadline {
            Some(deadline) if deadline < task_limit => (deadline, true),
            _ => (task_limit, false),
        };

        let result = tokio::time::timeout_at(limit, self.execute(&mut task)).await;
        match result {
            Ok(Ok(())) => {
                task.status = TaskStatus::Completed;
                tracing::info!(key = %task.record.key, to = %task.destination_key, "copy complete");
                self.send_progress(SyncProgress::TaskCompleted {
                    key: task.record.key.clone(),
                    size: task.record.size,
                })
                .await;
                Ok(task)
            }
            Ok(Err(error)) => Err(self.fail(task, error).await),
            Err(_) => {
                let error = if run_bound {
                    self.deadline_error(&task)
                } else {
                    SyncError::TaskTimeout {
                        key: task.record.key.clone(),
                        timeout: self.options.task_timeout,
                    }
                };
                Err(self.fail(task, error).await)
            }
        }
    }

    async fn execute(&self, task: &mut CopyTask) -> Result<(), SyncError> {
        let source_key = self.source.object_key(&task.record.key);
        let from = self.source.display_key(&task.record.key);
        let to = format!("s3://{}/{}", self.dest.scope(), task.destination_key);
        let storage = self.dest.storage();

        task.status = TaskStatus::Copying;
        self.send_progress(SyncProgress::TaskStarted {
            from: from.clone(),
            to: to.clone(),
        })
        .await;

        self.options.limiter.acquire().await;
        storage
            .copy_object(
                self.source.scope(),
                &source_key,
                self.dest.scope(),
                &task.destination_key,
            )
            .await
            .map_err(|source| SyncError::Copy { from, to, source })?;

        task.status = TaskStatus::Verifying;
        self.options.limiter.acquire().await;
        let visible = storage
            .wait_until_exists(self.dest.scope(), &task.destination_key, &self.options.verify)
            .await
            .map_err(|e| SyncError::Verification {
                key: task.destination_key.clone(),
                reason: e.to_string(),
            })?;

        if !visible {
            return Err(SyncError::Verification {
                key: task.destination_key.clone(),
                reason: format!(
                    "still missing after {} checks",
                    self.options.verify.max_attempts
                ),
            });
        }

        Ok(())
    }

    fn deadline_error(&self, task: &CopyTask) -> SyncError {
        SyncError::RunDeadline {
            key: task.record.key.clone(),
            deadline: self.options.run_deadline.unwrap_or_default(),
        }
    }

    async fn fail(&self, task: CopyTask, error: SyncError) -> CopyFailure {
        tracing::error!(key = %task.record.key, stage = ?task.status, "{}", error);
        self.send_progress(SyncProgress::TaskFailed {
            key: task.record.key.clone(),
            reason: error.to_string(),
        })
        .await;
        CopyFailure {
            key: task.record.key,
            destination_key: task.destination_key,
            stage: task.status,
            error,
        }
    }
}

/// Runs the copy phase of a sync.
pub struct CopyOrchestrator {
    options: CopyOptions,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl CopyOrchestrator {
    pub fn new(options: CopyOptions) -> Self {
        Self {
            options,
            progress_tx: None,
        }
    }

    /// Report progress events on `progress_tx`.
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy every entry of `diff` from `source` to `dest`.
    ///
    /// An empty set returns immediately without touching storage.
    pub async fn sync(
        &self,
        diff: &DiffSet,
        source: &StorageLocation,
        dest: &StorageLocation,
    ) -> SyncReport {
        let started = std::time::Instant::now();
        if diff.is_empty() {
            return SyncReport::nothing_to_do();
        }

        let tasks: Vec<CopyTask> = diff
            .iter()
            .map(|record| CopyTask::new(record.clone(), dest))
            .collect();
        warn_on_collisions(&tasks);

        let context = Arc::new(TaskContext {
            source: source.clone(),
            dest: dest.clone(),
            options: self.options.clone(),
            run_deadline: self.options.run_deadline.map(|budget| Instant::now() + budget),
            progress_tx: self.progress_tx.clone(),
        });

        let workers = self.options.max_concurrency.max(1);
        tracing::info!(tasks = tasks.len(), workers, "starting copy phase");

        let results: Vec<Result<CopyTask, CopyFailure>> = stream::iter(tasks)
            .map(|task| {
                let context = Arc::clone(&context);
                let key = task.record.key.clone();
                let destination_key = task.destination_key.clone();
                async move {
                    match tokio::spawn(async move { context.run(task).await }).await {
                        Ok(result) => result,
                        Err(join_err) => Err(CopyFailure {
                            key: key.clone(),
                            destination_key,
                            stage: TaskStatus::Failed,
                            error: SyncError::TaskAborted {
                                key,
                                reason: join_err.to_string(),
                            },
                        }),
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = SyncReport::new(diff.len());
        for result in results {
            match result {
                Ok(task) => report.record_success(&task.record),
                Err(failure) => report.record_failure(failure),
            }
        }
        report.duration = started.elapsed();
        report
    }
}

/// Flattening can map several source keys onto one destination key.
fn warn_on_collisions(tasks: &[CopyTask]) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for task in tasks {
        if let Some(previous) = seen.insert(&task.destination_key, &task.record.key) {
            tracing::warn!(
                destination = %task.destination_key,
                first = previous,
                second = %task.record.key,
                "several source objects copy to the same destination key"
            );
        }
    }
}
