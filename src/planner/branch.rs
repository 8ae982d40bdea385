//! Staging branch resolution.

use serde::Serialize;
use tracing::{debug, info};

use crate::adapter::BranchStore;
use crate::error::{BranchError, Result};

/// Default trunk branch name.
pub const DEFAULT_TRUNK: &str = "main";

/// Resolved staging branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    /// Branch name.
    pub name: String,
    /// Whether the branch exists.
    pub exists: bool,
    /// Whether this run created it.
    pub created_this_run: bool,
    /// System-specific scope (branch schema id, project id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    /// Whether this is the unscoped trunk.
    pub trunk: bool,
}

impl BranchRef {
    /// The trunk branch. It always exists and carries no scope.
    #[must_use]
    pub fn trunk(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: true,
            created_this_run: false,
            scope_id: None,
            trunk: true,
        }
    }

    /// An existing non-trunk branch.
    #[must_use]
    pub fn existing(name: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: true,
            created_this_run: false,
            scope_id: Some(scope_id.into()),
            trunk: false,
        }
    }

    /// A branch that does not exist yet.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            created_this_run: false,
            scope_id: None,
            trunk: false,
        }
    }

    /// Marks the branch as created by this run.
    #[must_use]
    pub const fn created(mut self) -> Self {
        self.exists = true;
        self.created_this_run = true;
        self
    }

    /// Returns the scope id when this is a scoped branch.
    #[must_use]
    pub fn scope_id(&self) -> Option<&str> {
        if self.trunk {
            None
        } else {
            self.scope_id.as_deref()
        }
    }
}

impl std::fmt::Display for BranchRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if self.trunk {
            write!(f, " (trunk)")?;
        } else if self.created_this_run {
            write!(f, " (created)")?;
        } else if !self.exists {
            write!(f, " (missing)")?;
        }
        Ok(())
    }
}

/// Resolves branch names against a [`BranchStore`].
pub struct BranchManager<'a> {
    /// Backing store.
    store: &'a dyn BranchStore,
    /// Trunk name.
    trunk: String,
}

impl std::fmt::Debug for BranchManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchManager")
            .field("trunk", &self.trunk)
            .finish_non_exhaustive()
    }
}

impl<'a> BranchManager<'a> {
    /// Creates a manager with the default trunk name.
    #[must_use]
    pub fn new(store: &'a dyn BranchStore) -> Self {
        Self {
            store,
            trunk: String::from(DEFAULT_TRUNK),
        }
    }

    /// Sets the trunk name.
    #[must_use]
    pub fn with_trunk(mut self, trunk: impl Into<String>) -> Self {
        self.trunk = trunk.into();
        self
    }

    /// Returns true if `name` is the trunk.
    #[must_use]
    pub fn is_trunk(&self, name: &str) -> bool {
        name == self.trunk
    }

    /// Looks a branch up without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn lookup(&self, name: &str) -> Result<Option<BranchRef>> {
        if self.is_trunk(name) {
            return Ok(Some(BranchRef::trunk(name)));
        }

        let found = self.store.find_branch(name).await?;
        debug!("Branch lookup {name}: {}", if found.is_some() { "found" } else { "absent" });
        Ok(found)
    }

    /// Resolves a branch, creating it only when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns `BranchError::NotFound` if the branch is absent and `force`
    /// is false, or an error from the store.
    pub async fn resolve_branch(&self, name: &str, force: bool) -> Result<BranchRef> {
        if let Some(branch) = self.lookup(name).await? {
            return Ok(branch);
        }

        if !force {
            return Err(BranchError::NotFound {
                name: name.to_string(),
            }
            .into());
        }

        info!("Creating branch {name}");
        let branch = self.store.create_branch(name).await?;
        Ok(branch.created())
    }
}
