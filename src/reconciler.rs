//! Reconciler driving one sync run.
//!
//! A run moves through explicit phases:
//! `Planning -> Diffing -> (DryRunRender | BranchResolving -> Applying) -> Done`.
//! Every run starts from live reads; nothing is cached between runs.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::adapter::{BranchStore, InventorySource, SyncTarget};
use crate::error::{BranchError, PlanError, Result};
use crate::planner::{
    BranchManager, BranchRef, ChangeSet, DEFAULT_TRUNK, DiffEngine, ExecutionReport, OpKind,
    RetryPolicy, SyncExecutor, SyncMode,
};
use crate::resource::{Normalizer, Origin, System};

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Branch lookup and concurrent reads.
    Planning,
    /// Normalization and diff.
    Diffing,
    /// Rendering without mutation.
    DryRunRender,
    /// Resolving or creating the branch.
    BranchResolving,
    /// Applying the change set.
    Applying,
    /// Run finished.
    Done,
}

/// What a run should do.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Staging branch name.
    pub branch: String,
    /// Whether a missing branch may be created.
    pub force: bool,
    /// Dry run or commit.
    pub mode: SyncMode,
    /// Digest the change set must match before mutating.
    pub expect_digest: Option<String>,
}

impl SyncRequest {
    /// Creates a dry-run request on a branch.
    #[must_use]
    pub fn dry_run(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            force: false,
            mode: SyncMode::DryRun,
            expect_digest: None,
        }
    }

    /// Creates a commit request on a branch.
    #[must_use]
    pub fn commit(branch: impl Into<String>) -> Self {
        Self {
            mode: SyncMode::Commit,
            ..Self::dry_run(branch)
        }
    }

    /// Authorizes branch creation.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Pins the change set digest.
    #[must_use]
    pub fn with_expected_digest(mut self, digest: Option<String>) -> Self {
        self.expect_digest = digest;
        self
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Run identifier, also attached to every log line.
    pub run_id: Uuid,
    /// System holding desired state.
    pub source: System,
    /// System that was compared and mutated.
    pub target: System,
    /// Computed change set.
    pub change_set: ChangeSet,
    /// Digest of the change set.
    pub digest: String,
    /// Per-operation report.
    pub report: ExecutionReport,
    /// Phases the run passed through.
    pub phases: Vec<Phase>,
}

impl SyncOutcome {
    /// Returns true if the run should exit non-zero.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.report.has_failures() || self.report.cancelled
    }
}

/// Reconciler for one source/target pair.
pub struct Reconciler<'a> {
    /// Reader for desired state.
    source: &'a dyn InventorySource,
    /// Reader for observed state on the target.
    observed: &'a dyn InventorySource,
    /// Branch store of the target.
    branches: &'a dyn BranchStore,
    /// Target to mutate.
    target: &'a dyn SyncTarget,
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Retry policy for mutations.
    retry: RetryPolicy,
    /// Trunk branch name.
    trunk: String,
    /// Cancellation flag.
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("source", &self.source.system())
            .field("target", &self.target.system())
            .field("trunk", &self.trunk)
            .finish_non_exhaustive()
    }
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(
        source: &'a dyn InventorySource,
        observed: &'a dyn InventorySource,
        branches: &'a dyn BranchStore,
        target: &'a dyn SyncTarget,
    ) -> Self {
        Self {
            source,
            observed,
            branches,
            target,
            diff_engine: DiffEngine::new(),
            retry: RetryPolicy::default(),
            trunk: String::from(DEFAULT_TRUNK),
            cancel: None,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the trunk name.
    #[must_use]
    pub fn with_trunk(mut self, trunk: impl Into<String>) -> Self {
        self.trunk = trunk.into();
        self
    }

    /// Sets the cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Performs one run.
    ///
    /// # Errors
    ///
    /// Returns an error on read, normalization or invariant failures, when
    /// the branch is missing and not forced, or when the change set does not
    /// match the expected digest. Per-operation failures are reported in the
    /// outcome instead.
    pub async fn run(&self, request: &SyncRequest) -> Result<SyncOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "sync",
            run_id = %run_id,
            branch = %request.branch,
            mode = %request.mode,
        );
        self.run_phases(run_id, request).instrument(span).await
    }

    async fn run_phases(&self, run_id: Uuid, request: &SyncRequest) -> Result<SyncOutcome> {
        let mut phases = vec![Phase::Planning];
        info!(
            "Syncing {} -> {} on branch {}",
            self.source.system(),
            self.target.system(),
            request.branch
        );

        let manager = BranchManager::new(self.branches).with_trunk(self.trunk.as_str());
        let scope = manager.lookup(&request.branch).await?;

        if scope.is_none() && request.mode == SyncMode::Commit && !request.force {
            return Err(BranchError::NotFound {
                name: request.branch.clone(),
            }
            .into());
        }

        // a branch that does not exist yet starts as a copy of the trunk
        let profile = self.target.managed_fields();
        let kinds = profile.kinds();
        let (desired_raw, observed_raw) = tokio::try_join!(
            self.source.fetch_records(&kinds, None),
            self.observed.fetch_records(&kinds, scope.as_ref()),
        )?;
        debug!(
            "Read {} source records and {} target records",
            desired_raw.len(),
            observed_raw.len()
        );

        phases.push(Phase::Diffing);
        let desired = Normalizer::new(self.source.system(), Origin::Source, profile.clone())
            .normalize(&desired_raw)?;
        let observed = Normalizer::new(self.target.system(), Origin::Target, profile)
            .normalize(&observed_raw)?;

        let change_set = self.diff_engine.compute_diff(&desired, &observed)?;
        let digest = change_set.digest();
        info!(
            "Change set {}: {} creates, {} updates, {} deletes, {} unchanged",
            change_set.short_digest(),
            change_set.count(OpKind::Create),
            change_set.count(OpKind::Update),
            change_set.count(OpKind::Delete),
            change_set.unchanged()
        );

        if let Some(expected) = &request.expect_digest
            && !change_set.digest_matches(expected)
        {
            return Err(PlanError::DigestMismatch {
                expected: expected.clone(),
                actual: digest,
            }
            .into());
        }

        let report = match request.mode {
            SyncMode::DryRun => {
                phases.push(Phase::DryRunRender);
                let branch = scope.unwrap_or_else(|| BranchRef::missing(request.branch.as_str()));
                self.executor().apply(&change_set, &branch, SyncMode::DryRun).await
            }
            SyncMode::Commit => {
                phases.push(Phase::BranchResolving);
                let branch = manager.resolve_branch(&request.branch, request.force).await?;

                phases.push(Phase::Applying);
                self.executor().apply(&change_set, &branch, SyncMode::Commit).await
            }
        };

        phases.push(Phase::Done);
        info!("{report}");

        Ok(SyncOutcome {
            run_id,
            source: self.source.system(),
            target: self.target.system(),
            change_set,
            digest,
            report,
            phases,
        })
    }

    fn executor(&self) -> SyncExecutor<'a> {
        let executor = SyncExecutor::new(self.target).with_retry(self.retry);
        match &self.cancel {
            Some(cancel) => executor.with_cancel_flag(Arc::clone(cancel)),
            None => executor,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Diffing => "diffing",
            Self::DryRunRender => "dry-run render",
            Self::BranchResolving => "branch resolving",
            Self::Applying => "applying",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}
