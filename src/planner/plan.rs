//! Change set types and construction.
//!
//! This module defines the structure of a change set and the fixed order in
//! which its operations run: deletes, then updates, then creates.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::InvariantViolation;
use crate::resource::{AttrValue, Resource, ResourceId, ResourceKind};

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Resource must be created on the target.
    Create,
    /// Resource exists on both sides with differing fields.
    Update,
    /// Resource exists only on the target.
    Delete,
}

/// A single differing field of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Canonical field name.
    pub field: String,
    /// Observed value; `None` when the target does not carry the field.
    pub old_value: Option<AttrValue>,
    /// Desired value.
    pub new_value: AttrValue,
}

/// One unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOperation {
    /// Kind of change.
    pub op_kind: OpKind,
    /// Kind of the targeted resource.
    pub kind: ResourceKind,
    /// Identity of the targeted resource.
    pub identity_key: String,
    /// Desired snapshot (absent for deletes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<Resource>,
    /// Observed snapshot (absent for creates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<Resource>,
    /// Differing fields, updates only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_diffs: Vec<FieldDiff>,
}

/// Ordered sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Operations in execution order.
    operations: Vec<ChangeOperation>,
    /// Resources present on both sides with no differences.
    unchanged: usize,
}

impl OpKind {
    /// Position of the class in a change set.
    #[must_use]
    pub const fn class_rank(self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Update => 1,
            Self::Create => 2,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Diff marker used when rendering.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Create => '+',
            Self::Update => '~',
            Self::Delete => '-',
        }
    }
}

impl ChangeOperation {
    /// Creates a create operation.
    #[must_use]
    pub fn create(desired: Resource) -> Self {
        Self {
            op_kind: OpKind::Create,
            kind: desired.kind,
            identity_key: desired.identity_key.clone(),
            desired: Some(desired),
            observed: None,
            field_diffs: vec![],
        }
    }

    /// Creates a delete operation.
    #[must_use]
    pub fn delete(observed: Resource) -> Self {
        Self {
            op_kind: OpKind::Delete,
            kind: observed.kind,
            identity_key: observed.identity_key.clone(),
            desired: None,
            observed: Some(observed),
            field_diffs: vec![],
        }
    }

    /// Creates an update operation.
    ///
    /// # Errors
    ///
    /// Returns an error if `field_diffs` is empty: a no-op comparison must
    /// never become an update.
    pub fn update(
        desired: Resource,
        observed: Resource,
        field_diffs: Vec<FieldDiff>,
    ) -> Result<Self, InvariantViolation> {
        if field_diffs.is_empty() {
            return Err(InvariantViolation::EmptyUpdate {
                kind: desired.kind,
                identity_key: desired.identity_key,
            });
        }

        Ok(Self {
            op_kind: OpKind::Update,
            kind: desired.kind,
            identity_key: desired.identity_key.clone(),
            desired: Some(desired),
            observed: Some(observed),
            field_diffs,
        })
    }

    /// Returns the targeted resource's key.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        ResourceId {
            kind: self.kind,
            identity_key: self.identity_key.clone(),
        }
    }

    /// Provider-native id of the observed resource.
    #[must_use]
    pub fn native_id(&self) -> Option<&str> {
        self.observed.as_ref().and_then(|r| r.native_id.as_deref())
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        let verb = match self.op_kind {
            OpKind::Create => "Create",
            OpKind::Update => "Update",
            OpKind::Delete => "Delete",
        };
        format!("{verb} {} '{}'", self.kind, self.identity_key)
    }

    /// Renders the operation as one diff line.
    #[must_use]
    pub fn render(&self) -> String {
        let head = format!("{} {} {}", self.op_kind.symbol(), self.kind, self.identity_key);
        match self.op_kind {
            OpKind::Create => {
                let attrs = self
                    .desired
                    .as_ref()
                    .map(|r| {
                        r.attributes
                            .iter()
                            .map(|(k, v)| format!("{k}={v}"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                if attrs.is_empty() {
                    head
                } else {
                    format!("{head} ({attrs})")
                }
            }
            OpKind::Update => format!("{head}: {}", self.changes_summary()),
            OpKind::Delete => head,
        }
    }

    /// Summarizes the field changes of an update.
    #[must_use]
    pub fn changes_summary(&self) -> String {
        self.field_diffs
            .iter()
            .map(|d| {
                let old = d
                    .old_value
                    .as_ref()
                    .map_or_else(|| String::from("(unset)"), ToString::to_string);
                format!("{} {old} -> {}", d.field, d.new_value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ordering key inside a change set.
    fn sort_key(&self) -> (u8, u8, &str) {
        let kind_rank = match self.op_kind {
            // dependents go first when removing
            OpKind::Delete => u8::MAX - self.kind.rank(),
            OpKind::Update | OpKind::Create => self.kind.rank(),
        };
        (self.op_kind.class_rank(), kind_rank, self.identity_key.as_str())
    }
}

impl ChangeSet {
    /// Builds a change set, putting operations in canonical order.
    #[must_use]
    pub fn from_operations(mut operations: Vec<ChangeOperation>, unchanged: usize) -> Self {
        operations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self {
            operations,
            unchanged,
        }
    }

    /// Operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }

    /// Returns true if there is nothing to do.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.operations.len()
    }

    /// Number of resources that need no change.
    #[must_use]
    pub const fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Number of operations of one kind.
    #[must_use]
    pub fn count(&self, op_kind: OpKind) -> usize {
        self.operations
            .iter()
            .filter(|op| op.op_kind == op_kind)
            .count()
    }

    /// Renders every operation as a diff line.
    #[must_use]
    pub fn render_lines(&self) -> Vec<String> {
        self.operations.iter().map(ChangeOperation::render).collect()
    }

    /// Computes a SHA-256 digest over the canonical content.
    ///
    /// Native ids are excluded so that the digest only moves when the
    /// reconciliation itself changes.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();

        for op in &self.operations {
            hasher.update(op.op_kind.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(op.kind.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(op.identity_key.as_bytes());
            hasher.update(b"\0");

            if let Some(desired) = &op.desired {
                for (field, value) in &desired.attributes {
                    hasher.update(field.as_bytes());
                    hasher.update(b"=");
                    hasher.update(value.to_string().as_bytes());
                    hasher.update(b"\0");
                }
            }

            for diff in &op.field_diffs {
                hasher.update(diff.field.as_bytes());
                hasher.update(b":");
                if let Some(old) = &diff.old_value {
                    hasher.update(old.to_string().as_bytes());
                }
                hasher.update(b"->");
                hasher.update(diff.new_value.to_string().as_bytes());
                hasher.update(b"\0");
            }

            hasher.update(b"\n");
        }

        hex::encode(hasher.finalize())
    }

    /// Returns the first eight characters of the digest.
    #[must_use]
    pub fn short_digest(&self) -> String {
        self.digest()[..8].to_string()
    }

    /// Returns true if `candidate` matches the digest or a prefix of it.
    #[must_use]
    pub fn digest_matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim().to_ascii_lowercase();
        candidate.len() >= 8 && self.digest().starts_with(&candidate)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operations.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Change set ({} operations):", self.operations.len())?;
        for (i, op) in self.operations.iter().enumerate() {
            writeln!(f, "  {}. {op}", i + 1)?;
        }
        Ok(())
    }
}
