//! Run summary.

use humansize::{format_size, BINARY};
use std::time::Duration;

use crate::storage::ObjectRecord;
use crate::sync::copy::CopyFailure;

/// How a run ended, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Destination already had every source fingerprint.
    NothingToDo,
    /// Every copy completed.
    Completed,
    /// Some copies failed; carries the number of failures.
    CompletedWithFailures(usize),
    /// Nothing was copied on purpose; carries the planned copy count.
    DryRun(usize),
}

/// Aggregate result of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Entries in the diff set.
    pub diff_size: usize,
    /// Source objects dropped by exclude patterns before diffing.
    pub excluded: usize,
    /// Source keys copied and verified.
    pub copied: Vec<String>,
    pub failures: Vec<CopyFailure>,
    pub bytes_copied: u64,
    pub duration: Duration,
    /// Entries that would be copied, filled for dry runs only.
    pub planned: Vec<ObjectRecord>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn new(diff_size: usize) -> Self {
        Self {
            diff_size,
            ..Self::default()
        }
    }

    pub fn nothing_to_do() -> Self {
        Self::default()
    }

    pub fn dry_run(planned: Vec<ObjectRecord>) -> Self {
        Self {
            diff_size: planned.len(),
            planned,
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, record: &ObjectRecord) {
        self.copied.push(record.key.clone());
        self.bytes_copied += record.size;
    }

    pub fn record_failure(&mut self, failure: CopyFailure) {
        self.failures.push(failure);
    }

    pub fn succeeded(&self) -> usize {
        self.copied.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn outcome(&self) -> SyncOutcome {
        if self.diff_size == 0 {
            SyncOutcome::NothingToDo
        } else if self.dry_run {
            SyncOutcome::DryRun(self.diff_size)
        } else if self.failures.is_empty() {
            SyncOutcome::Completed
        } else {
            SyncOutcome::CompletedWithFailures(self.failures.len())
        }
    }

    /// True unless at least one copy failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary. Failures are listed with their reasons.
    pub fn render(&self) -> String {
        let mut output = String::new();

        match self.outcome() {
            SyncOutcome::NothingToDo => output.push_str("Content is identical\n"),
            SyncOutcome::DryRun(count) => {
                let bytes: u64 = self.planned.iter().map(|r| r.size).sum();
                output.push_str(&format!(
                    "Dry run: {} objects ({}) would be copied\n",
                    count,
                    format_size(bytes, BINARY)
                ));
                for record in &self.planned {
                    output.push_str(&format!("  {} ({})\n", record.key, record.format_size()));
                }
            }
            SyncOutcome::Completed => output.push_str(&format!(
                "Copied {} objects ({}) in {:.2}s\n",
                self.succeeded(),
                format_size(self.bytes_copied, BINARY),
                self.duration.as_secs_f64()
            )),
            SyncOutcome::CompletedWithFailures(failed) => {
                output.push_str(&format!(
                    "Copied {} of {} objects ({}) in {:.2}s, {} failed:\n",
                    self.succeeded(),
                    self.diff_size,
                    format_size(self.bytes_copied, BINARY),
                    self.duration.as_secs_f64(),
                    failed
                ));
                for failure in &self.failures {
                    output.push_str(&format!("  {}: {}\n", failure.key, failure.error));
                }
            }
        }

        if self.excluded > 0 {
            output.push_str(&format!("Excluded by pattern: {} objects\n", self.excluded));
        }

        output
    }
}
