//! Seams between the reconciliation engine and the two inventory systems.
//!
//! The engine never talks HTTP itself. It reads raw records through an
//! [`InventorySource`], resolves staging branches through a [`BranchStore`]
//! and mutates through a [`SyncTarget`]. The NetBox and DigitalOcean
//! adapters implement all three.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::{ApiError, Result};
use crate::planner::{BranchRef, ChangeOperation};
use crate::resource::{FieldProfile, RawRecord, ResourceKind, System};

/// Reads raw inventory records from one system.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// System the records come from.
    fn system(&self) -> System;

    /// Fetches every record of the requested kinds.
    ///
    /// When `scope` names a non-trunk branch, the read is limited to it.
    async fn fetch_records(
        &self,
        kinds: &BTreeSet<ResourceKind>,
        scope: Option<&BranchRef>,
    ) -> Result<Vec<RawRecord>>;
}

/// Looks up and creates staging branches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Finds a branch by name. Never creates anything.
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>>;

    /// Creates a branch and waits until it can be written to.
    async fn create_branch(&self, name: &str) -> Result<BranchRef>;
}

/// Applies change operations to the target system.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// System being mutated.
    fn system(&self) -> System;

    /// Kinds and fields this target manages.
    fn managed_fields(&self) -> FieldProfile;

    /// Applies one operation inside a branch.
    ///
    /// A delete of an object that is already gone succeeds.
    async fn apply(&self, op: &ChangeOperation, branch: &BranchRef) -> std::result::Result<(), ApiError>;
}
