//! Sync executor for applying change sets.
//!
//! This module applies a change set against the target, operation by
//! operation, with bounded retries for transient failures. A failed
//! operation never stops the ones after it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapter::SyncTarget;
use crate::error::ApiError;

use super::branch::BranchRef;
use super::plan::{ChangeOperation, ChangeSet};

/// Whether mutations are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Render only; no mutating calls.
    DryRun,
    /// Apply every operation.
    Commit,
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32, err: &ApiError) -> Duration {
        let delay = err.retry_delay_secs().map_or_else(
            || {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            },
            Duration::from_secs,
        );
        delay.min(self.max_delay)
    }
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// Mutation succeeded.
    Applied,
    /// Mutation failed.
    Failed(String),
    /// Mutation not attempted.
    Skipped(String),
}

/// Report line for one operation.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Operation that was processed.
    pub operation: ChangeOperation,
    /// What happened.
    pub outcome: Outcome,
    /// Calls made to the target.
    pub attempts: u32,
}

/// Result of applying a change set.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Mode the change set was applied in.
    pub mode: SyncMode,
    /// Branch the changes were scoped to.
    pub branch: BranchRef,
    /// Entries in change-set order.
    pub entries: Vec<ReportEntry>,
    /// Start of execution.
    pub started_at: DateTime<Utc>,
    /// End of execution.
    pub finished_at: DateTime<Utc>,
    /// Whether execution was cancelled.
    pub cancelled: bool,
}

/// Executor for change sets.
pub struct SyncExecutor<'a> {
    /// Target to mutate.
    target: &'a dyn SyncTarget,
    /// Retry policy.
    retry: RetryPolicy,
    /// Set when the run should stop issuing mutations.
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for SyncExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncExecutor")
            .field("target", &self.target.system())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<'a> SyncExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub fn new(target: &'a dyn SyncTarget) -> Self {
        Self {
            target,
            retry: RetryPolicy::default(),
            cancel: None,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Applies a change set.
    ///
    /// In dry-run mode no call reaches the target. In commit mode every
    /// operation is attempted in order; failures are recorded, not returned.
    pub async fn apply(
        &self,
        change_set: &ChangeSet,
        branch: &BranchRef,
        mode: SyncMode,
    ) -> ExecutionReport {
        let started_at = Utc::now();
        let mut entries = Vec::with_capacity(change_set.len());
        let mut cancelled = false;

        if mode == SyncMode::Commit {
            info!(
                "Applying {} operations to {} on branch {branch}",
                change_set.len(),
                self.target.system()
            );
        }

        for (idx, op) in change_set.operations().iter().enumerate() {
            let entry = match mode {
                SyncMode::DryRun => {
                    info!("[dry run] {}", op.render());
                    ReportEntry {
                        operation: op.clone(),
                        outcome: Outcome::Skipped(String::from("dry run")),
                        attempts: 0,
                    }
                }
                SyncMode::Commit if cancelled || self.is_cancelled() => {
                    if !cancelled {
                        warn!("Cancelled, skipping remaining {} operations", change_set.len() - idx);
                        cancelled = true;
                    }
                    ReportEntry {
                        operation: op.clone(),
                        outcome: Outcome::Skipped(String::from("cancelled")),
                        attempts: 0,
                    }
                }
                SyncMode::Commit => self.apply_operation(idx, op, branch).await,
            };
            entries.push(entry);
        }

        ExecutionReport {
            mode,
            branch: branch.clone(),
            entries,
            started_at,
            finished_at: Utc::now(),
            cancelled,
        }
    }

    /// Applies one operation, retrying transient failures.
    async fn apply_operation(&self, index: usize, op: &ChangeOperation, branch: &BranchRef) -> ReportEntry {
        info!("Executing operation {index}: {}", op.description());

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = match self.target.apply(op, branch).await {
                Ok(()) => Outcome::Applied,
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    let delay = self.retry.delay_for(attempts, &e);
                    warn!(
                        "{} failed (attempt {attempts}/{max_attempts}), retrying in {delay:?}: {e}",
                        op.description()
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    error!("Failed to {}: {e}", op.description().to_lowercase());
                    Outcome::Failed(e.to_string())
                }
            };

            if outcome == Outcome::Applied {
                info!("{} applied", op.description());
            }

            return ReportEntry {
                operation: op.clone(),
                outcome,
                attempts,
            };
        }
    }
}

impl Outcome {
    /// Short label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }

    /// Reason for failed or skipped outcomes.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Applied => None,
            Self::Failed(reason) | Self::Skipped(reason) => Some(reason),
        }
    }
}

impl ExecutionReport {
    /// Number of applied operations.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    /// Number of failed operations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Number of skipped operations.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Returns true if any operation failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Returns true if every operation was applied.
    #[must_use]
    pub fn all_applied(&self) -> bool {
        self.entries.iter().all(|e| e.outcome == Outcome::Applied)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} ({reason})", self.label()),
            None => write!(f, "{}", self.label()),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DryRun => "dry run",
            Self::Commit => "commit",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processed {} operations: {} applied, {} failed, {} skipped",
            self.entries.len(),
            self.applied(),
            self.failed(),
            self.skipped()
        )
    }
}
