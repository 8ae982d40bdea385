//! NetBox as inventory source, branch store and sync target.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapter::{BranchStore, InventorySource, SyncTarget};
use crate::error::{ApiError, BranchError, Result};
use crate::planner::{BranchRef, ChangeOperation, OpKind};
use crate::resource::{AttrValue, FieldProfile, RawRecord, ResourceKind, System};

use super::client::NetBoxClient;
use super::types::{Branch, endpoint, identity_field, reference_kind};

/// Description attached to branches this tool creates.
const BRANCH_DESCRIPTION: &str = "Created by netbox-do-sync";

/// Color of device roles this tool creates.
const DEFAULT_ROLE_COLOR: &str = "ffffff";

/// NetBox adapter.
#[derive(Debug, Clone)]
pub struct NetBoxAdapter {
    /// API client.
    client: NetBoxClient,
    /// Query filters applied to device and address listings.
    filters: Vec<(String, String)>,
    /// How long to wait for a branch to become ready.
    branch_ready_timeout: Duration,
    /// Delay between branch status polls.
    branch_poll_interval: Duration,
}

impl NetBoxAdapter {
    /// Creates an adapter over a client.
    #[must_use]
    pub const fn new(client: NetBoxClient) -> Self {
        Self {
            client,
            filters: Vec::new(),
            branch_ready_timeout: Duration::from_secs(10),
            branch_poll_interval: Duration::from_secs(1),
        }
    }

    /// Sets the listing filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.filters = filters;
        self
    }

    /// Sets branch readiness timing.
    #[must_use]
    pub const fn with_branch_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.branch_ready_timeout = timeout;
        self.branch_poll_interval = poll_interval;
        self
    }

    /// Polls a branch until it is ready.
    async fn wait_ready(&self, mut branch: Branch) -> Result<Branch> {
        let started = tokio::time::Instant::now();

        while !branch.is_ready() {
            if started.elapsed() >= self.branch_ready_timeout {
                return Err(BranchError::NotReady {
                    name: branch.name,
                    status: branch.status.value,
                    timeout_secs: self.branch_ready_timeout.as_secs(),
                }
                .into());
            }
            debug!("Branch {} is {}, waiting", branch.name, branch.status.value);
            tokio::time::sleep(self.branch_poll_interval).await;
            branch = self.client.get_branch(branch.id).await?;
        }

        Ok(branch)
    }

    /// Builds a request body from canonical fields, resolving references to ids.
    async fn body<'f>(
        &self,
        kind: ResourceKind,
        values: impl Iterator<Item = (&'f String, &'f AttrValue)>,
        scope: Option<&str>,
    ) -> std::result::Result<Map<String, Value>, ApiError> {
        let mut body = Map::new();

        for (field, value) in values {
            let json = match (reference_kind(field), value.as_str()) {
                (Some(target), Some(slug)) => {
                    let id = self
                        .client
                        .find_id(endpoint(target), "slug", slug, scope)
                        .await?
                        .ok_or_else(|| {
                            ApiError::invalid(
                                System::NetBox,
                                format!("{kind} refers to missing {target} '{slug}'"),
                            )
                        })?;
                    Value::from(id)
                }
                _ => value.to_json(),
            };
            body.insert(field.clone(), json);
        }

        Ok(body)
    }

    async fn create(&self, op: &ChangeOperation, scope: Option<&str>) -> std::result::Result<(), ApiError> {
        let desired = op
            .desired
            .as_ref()
            .ok_or_else(|| ApiError::invalid(System::NetBox, "create without desired state"))?;

        let mut body = self.body(op.kind, desired.attributes.iter(), scope).await?;

        let identity = match op.kind {
            ResourceKind::IpAddress if !op.identity_key.contains('/') => format!("{}/32", op.identity_key),
            _ => op.identity_key.clone(),
        };
        body.insert(identity_field(op.kind).to_string(), Value::String(identity));
        if op.kind == ResourceKind::DeviceRole {
            body.entry("color").or_insert_with(|| Value::from(DEFAULT_ROLE_COLOR));
        }

        self.client.create(endpoint(op.kind), &Value::Object(body), scope).await?;
        Ok(())
    }

    async fn update(&self, op: &ChangeOperation, scope: Option<&str>) -> std::result::Result<(), ApiError> {
        let id = native_id(op)?;
        let changed = op.field_diffs.iter().map(|d| (&d.field, &d.new_value));
        let body = self.body(op.kind, changed, scope).await?;

        self.client
            .patch(endpoint(op.kind), id, &Value::Object(body), scope)
            .await
    }

    async fn delete(&self, op: &ChangeOperation, scope: Option<&str>) -> std::result::Result<(), ApiError> {
        let id = native_id(op)?;
        match self.client.delete(endpoint(op.kind), id, scope).await {
            Err(e) if e.is_not_found() => {
                info!("{} '{}' was already deleted", op.kind, op.identity_key);
                Ok(())
            }
            result => result,
        }
    }
}

fn native_id(op: &ChangeOperation) -> std::result::Result<&str, ApiError> {
    op.native_id().ok_or_else(|| {
        ApiError::invalid(
            System::NetBox,
            format!("{} '{}' has no NetBox id", op.kind, op.identity_key),
        )
    })
}

#[async_trait]
impl InventorySource for NetBoxAdapter {
    fn system(&self) -> System {
        System::NetBox
    }

    async fn fetch_records(
        &self,
        kinds: &BTreeSet<ResourceKind>,
        scope: Option<&BranchRef>,
    ) -> Result<Vec<RawRecord>> {
        let schema_id = scope.and_then(BranchRef::scope_id);
        let mut records = Vec::new();

        for kind in kinds {
            let filters: &[(String, String)] = match kind {
                ResourceKind::Device | ResourceKind::IpAddress => &self.filters,
                _ => &[],
            };
            let objects = self.client.list_all(endpoint(*kind), filters, schema_id).await?;
            records.extend(objects.into_iter().map(|body| RawRecord::primary(*kind, body)));
        }

        Ok(records)
    }
}

#[async_trait]
impl BranchStore for NetBoxAdapter {
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>> {
        let Some(branch) = self.client.find_branch(name).await? else {
            return Ok(None);
        };
        let branch = self.wait_ready(branch).await?;
        Ok(Some(BranchRef::existing(branch.name, branch.schema_id)))
    }

    async fn create_branch(&self, name: &str) -> Result<BranchRef> {
        let branch = self.client.create_branch(name, BRANCH_DESCRIPTION).await?;
        info!("Created NetBox branch {name} ({})", branch.schema_id);
        let branch = self.wait_ready(branch).await?;
        Ok(BranchRef::existing(branch.name, branch.schema_id))
    }
}

#[async_trait]
impl SyncTarget for NetBoxAdapter {
    fn system(&self) -> System {
        System::NetBox
    }

    fn managed_fields(&self) -> FieldProfile {
        FieldProfile::all()
    }

    async fn apply(&self, op: &ChangeOperation, branch: &BranchRef) -> std::result::Result<(), ApiError> {
        let scope = branch.scope_id();
        match op.op_kind {
            OpKind::Create => self.create(op, scope).await,
            OpKind::Update => self.update(op, scope).await,
            OpKind::Delete => self.delete(op, scope).await,
        }
    }
}
