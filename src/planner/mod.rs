//! Planning module for reconciliation.
//!
//! This module compares desired and observed resources, resolves the
//! staging branch and applies the resulting change set.

mod branch;
mod diff;
mod executor;
mod plan;

pub use branch::{BranchManager, BranchRef, DEFAULT_TRUNK};
pub use diff::DiffEngine;
pub use executor::{ExecutionReport, Outcome, ReportEntry, RetryPolicy, SyncExecutor, SyncMode};
pub use plan::{ChangeOperation, ChangeSet, FieldDiff, OpKind};
