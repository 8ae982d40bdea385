//! DigitalOcean as inventory source, branch store and sync target.
//!
//! Droplets carrying the managed tag are the inventory. Each droplet also
//! yields its region (a site), its size (a device type) and the fixed
//! DigitalOcean manufacturer and droplet role as shared records, plus one
//! record per IPv4 address.
//!
//! A branch is a project: created droplets are assigned to it, and the
//! trunk is the account's default project.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::adapter::{BranchStore, InventorySource, SyncTarget};
use crate::error::{ApiError, Result};
use crate::planner::{BranchRef, ChangeOperation, OpKind};
use crate::resource::{AttrValue, FieldProfile, RawRecord, ResourceKind, System, fields};

use super::client::DigitalOceanClient;
use super::types::{CreateDropletRequest, CreateProjectRequest, DropletAction};

/// Tag marking droplets owned by this tool.
pub const DEFAULT_MANAGED_TAG: &str = "netbox-managed";

/// Image used for new droplets.
pub const DEFAULT_IMAGE: &str = "ubuntu-24-04-x64";

/// Settings for droplet and project creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropletDefaults {
    /// Tag added to, and used to list, managed droplets.
    pub tag: String,
    /// Image slug for new droplets.
    pub image: String,
    /// SSH keys installed on new droplets.
    pub ssh_keys: Vec<String>,
    /// Purpose of projects created as branches.
    pub project_purpose: String,
    /// Environment of projects created as branches.
    pub project_environment: String,
}

impl Default for DropletDefaults {
    fn default() -> Self {
        Self {
            tag: String::from(DEFAULT_MANAGED_TAG),
            image: String::from(DEFAULT_IMAGE),
            ssh_keys: Vec::new(),
            project_purpose: String::from("Service or API"),
            project_environment: String::from("Development"),
        }
    }
}

/// DigitalOcean adapter.
#[derive(Debug, Clone)]
pub struct DigitalOceanAdapter {
    /// API client.
    client: DigitalOceanClient,
    /// Creation defaults.
    defaults: DropletDefaults,
}

impl DigitalOceanAdapter {
    /// Creates an adapter over a client.
    #[must_use]
    pub fn new(client: DigitalOceanClient) -> Self {
        Self {
            client,
            defaults: DropletDefaults::default(),
        }
    }

    /// Sets creation defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: DropletDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Expands one droplet into the records the requested kinds need.
    fn expand(droplet: &Value, kinds: &BTreeSet<ResourceKind>, records: &mut Vec<RawRecord>) {
        if kinds.contains(&ResourceKind::Device) {
            records.push(RawRecord::primary(ResourceKind::Device, droplet.clone()));
        }

        if kinds.contains(&ResourceKind::Site)
            && let Some(region) = droplet.get("region")
        {
            records.push(RawRecord::shared(ResourceKind::Site, region.clone()));
        }

        if kinds.contains(&ResourceKind::DeviceType) {
            let size = match droplet.get("size") {
                Some(size @ Value::Object(_)) => size.clone(),
                _ => json!({ "slug": droplet.get("size_slug") }),
            };
            records.push(RawRecord::shared(ResourceKind::DeviceType, size));
        }

        if kinds.contains(&ResourceKind::IpAddress) {
            let name = droplet.get("name").cloned().unwrap_or(Value::Null);
            let v4 = droplet
                .pointer("/networks/v4")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for network in v4 {
                records.push(RawRecord::primary(
                    ResourceKind::IpAddress,
                    json!({
                        "ip_address": network.get("ip_address"),
                        "netmask": network.get("netmask"),
                        "type": network.get("type"),
                        "droplet": name,
                    }),
                ));
            }
        }
    }

    /// Records implied by the provider itself.
    fn static_records(kinds: &BTreeSet<ResourceKind>) -> Vec<RawRecord> {
        let mut records = Vec::new();
        if kinds.contains(&ResourceKind::Manufacturer) {
            records.push(RawRecord::shared(
                ResourceKind::Manufacturer,
                json!({"name": "DigitalOcean", "slug": "digitalocean", "description": "Cloud provider"}),
            ));
        }
        if kinds.contains(&ResourceKind::DeviceRole) {
            records.push(RawRecord::shared(
                ResourceKind::DeviceRole,
                json!({"name": "Droplet", "slug": "droplet"}),
            ));
        }
        records
    }

    /// Creates the droplet, then assigns it and applies its power state.
    ///
    /// Only the droplet POST may be retried. Once the droplet exists, a
    /// later failure is reported as partially applied with the droplet id.
    async fn create(&self, op: &ChangeOperation, branch: &BranchRef) -> std::result::Result<(), ApiError> {
        let desired = op
            .desired
            .as_ref()
            .ok_or_else(|| ApiError::invalid(System::DigitalOcean, "create without desired state"))?;

        let required = |field: &str| {
            desired.attr_str(field).map(String::from).ok_or_else(|| {
                ApiError::unsupported(
                    System::DigitalOcean,
                    format!("droplet '{}' needs a {field}", op.identity_key),
                )
            })
        };

        let power_off = match desired.attr_str(fields::STATUS) {
            None | Some("active") => false,
            Some("offline") => true,
            Some(other) => {
                return Err(ApiError::unsupported(
                    System::DigitalOcean,
                    format!("cannot create droplet '{}' with status {other}", op.identity_key),
                ));
            }
        };

        let request = CreateDropletRequest {
            name: op.identity_key.clone(),
            region: required(fields::SITE)?,
            size: required(fields::DEVICE_TYPE)?,
            image: self.defaults.image.clone(),
            tags: vec![self.defaults.tag.clone()],
            ssh_keys: self.defaults.ssh_keys.clone(),
        };

        let droplet = self.client.create_droplet(&request).await?;
        let droplet_id = droplet
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::invalid(System::DigitalOcean, "created droplet has no id"))?
            .to_string();
        debug!("Created droplet {} ({droplet_id})", op.identity_key);

        let created = format!("droplet {} created as {droplet_id}", op.identity_key);
        if let Some(project_id) = branch.scope_id() {
            self.client
                .assign_droplet(project_id, &droplet_id)
                .await
                .map_err(|e| e.after(System::DigitalOcean, created.as_str()))?;
        }
        if power_off {
            self.client
                .droplet_action(&droplet_id, &DropletAction::PowerOff)
                .await
                .map_err(|e| e.after(System::DigitalOcean, created.as_str()))?;
        }
        Ok(())
    }

    /// Sends one action per changed field, in field order.
    ///
    /// A failure after the first action is reported as partially applied.
    async fn update(&self, op: &ChangeOperation) -> std::result::Result<(), ApiError> {
        let id = native_id(op)?;

        let mut actions = Vec::new();
        for diff in &op.field_diffs {
            let action = match (diff.field.as_str(), &diff.new_value) {
                (fields::DEVICE_TYPE, AttrValue::Str(size)) => DropletAction::Resize {
                    size: size.clone(),
                    disk: false,
                },
                (fields::STATUS, AttrValue::Str(s)) if s == "active" => DropletAction::PowerOn,
                (fields::STATUS, AttrValue::Str(s)) if s == "offline" => DropletAction::PowerOff,
                (field, value) => {
                    return Err(ApiError::unsupported(
                        System::DigitalOcean,
                        format!("cannot change droplet {field} to {value}"),
                    ));
                }
            };
            actions.push(action);
        }

        let mut done: Vec<String> = Vec::new();
        for action in &actions {
            if let Err(e) = self.client.droplet_action(id, action).await {
                if done.is_empty() {
                    return Err(e);
                }
                return Err(e.after(
                    System::DigitalOcean,
                    format!("droplet {id}: {}", done.join(", ")),
                ));
            }
            done.push(action.to_string());
        }
        Ok(())
    }

    async fn delete(&self, op: &ChangeOperation) -> std::result::Result<(), ApiError> {
        let id = native_id(op)?;
        match self.client.delete_droplet(id).await {
            Err(e) if e.is_not_found() => {
                info!("Droplet {} was already deleted", op.identity_key);
                Ok(())
            }
            result => result,
        }
    }
}

fn native_id(op: &ChangeOperation) -> std::result::Result<&str, ApiError> {
    op.native_id().ok_or_else(|| {
        ApiError::invalid(
            System::DigitalOcean,
            format!("droplet '{}' has no id", op.identity_key),
        )
    })
}

#[async_trait]
impl InventorySource for DigitalOceanAdapter {
    fn system(&self) -> System {
        System::DigitalOcean
    }

    /// Projects do not scope reads: the managed tag defines the inventory.
    async fn fetch_records(
        &self,
        kinds: &BTreeSet<ResourceKind>,
        _scope: Option<&BranchRef>,
    ) -> Result<Vec<RawRecord>> {
        let droplets = self.client.list_droplets(Some(&self.defaults.tag)).await?;

        let mut records = Vec::new();
        if !droplets.is_empty() {
            records.extend(Self::static_records(kinds));
        }
        for droplet in &droplets {
            Self::expand(droplet, kinds, &mut records);
        }

        Ok(records)
    }
}

#[async_trait]
impl BranchStore for DigitalOceanAdapter {
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>> {
        let projects = self.client.list_projects().await?;
        Ok(projects
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| BranchRef::existing(p.name, p.id)))
    }

    async fn create_branch(&self, name: &str) -> Result<BranchRef> {
        let request = CreateProjectRequest {
            name: name.to_string(),
            purpose: self.defaults.project_purpose.clone(),
            environment: self.defaults.project_environment.clone(),
            description: String::from("Created by netbox-do-sync"),
        };
        let project = self.client.create_project(&request).await?;
        info!("Created DigitalOcean project {name} ({})", project.id);
        Ok(BranchRef::existing(project.name, project.id))
    }
}

#[async_trait]
impl SyncTarget for DigitalOceanAdapter {
    fn system(&self) -> System {
        System::DigitalOcean
    }

    fn managed_fields(&self) -> FieldProfile {
        FieldProfile::new().with_kind(
            ResourceKind::Device,
            &[fields::SITE, fields::DEVICE_TYPE, fields::STATUS],
        )
    }

    async fn apply(&self, op: &ChangeOperation, branch: &BranchRef) -> std::result::Result<(), ApiError> {
        if op.kind != ResourceKind::Device {
            return Err(ApiError::unsupported(
                System::DigitalOcean,
                format!("{} objects are not managed", op.kind),
            ));
        }

        match op.op_kind {
            OpKind::Create => self.create(op, branch).await,
            OpKind::Update => self.update(op).await,
            OpKind::Delete => self.delete(op).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ChangeSet, FieldDiff, Outcome, RetryPolicy, SyncExecutor, SyncMode};
    use crate::resource::{Normalizer, Origin, Resource};
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> DigitalOceanAdapter {
        let client = DigitalOceanClient::new(&server.uri(), "t", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::none());
        DigitalOceanAdapter::new(client).with_defaults(DropletDefaults {
            ssh_keys: vec![String::from("ab:cd")],
            ..DropletDefaults::default()
        })
    }

    fn droplet(id: u64, name: &str, ip: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "status": "active",
            "size_slug": "s-1vcpu-1gb",
            "size": {"slug": "s-1vcpu-1gb", "memory": 1024, "vcpus": 1},
            "region": {"name": "New York 1", "slug": "nyc1"},
            "networks": {"v4": [{"ip_address": ip, "netmask": "255.255.240.0", "type": "public"}]}
        })
    }

    fn device(name: &str, origin: Origin) -> Resource {
        Resource::new(ResourceKind::Device, name, origin)
            .with_attr(fields::SITE, "nyc1")
            .with_attr(fields::DEVICE_TYPE, "s-1vcpu-1gb")
            .with_attr(fields::STATUS, "active")
    }

    #[tokio::test]
    async fn test_records_normalize_with_shared_collapse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("tag_name", "netbox-managed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [droplet(1, "host-a", "203.0.113.10"), droplet(2, "host-b", "203.0.113.11")],
                "links": {}
            })))
            .mount(&server)
            .await;

        let records = adapter(&server)
            .fetch_records(&ResourceKind::ALL.into_iter().collect(), None)
            .await
            .unwrap();
        let resources = Normalizer::new(System::DigitalOcean, Origin::Source, FieldProfile::all())
            .normalize(&records)
            .unwrap();

        let count = |kind| resources.iter().filter(|r| r.kind == kind).count();
        assert_eq!(count(ResourceKind::Site), 1);
        assert_eq!(count(ResourceKind::Manufacturer), 1);
        assert_eq!(count(ResourceKind::DeviceRole), 1);
        assert_eq!(count(ResourceKind::DeviceType), 1);
        assert_eq!(count(ResourceKind::Device), 2);
        assert_eq!(count(ResourceKind::IpAddress), 2);

        let host_a = resources
            .iter()
            .find(|r| r.kind == ResourceKind::Device && r.identity_key == "host-a")
            .unwrap();
        assert_eq!(host_a.native_id.as_deref(), Some("1"));
        assert_eq!(host_a.attr_str(fields::ROLE), Some("droplet"));
    }

    #[tokio::test]
    async fn test_no_droplets_means_no_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"droplets": [], "links": {}})))
            .mount(&server)
            .await;

        let records = adapter(&server)
            .fetch_records(&ResourceKind::ALL.into_iter().collect(), None)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_to_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .and(body_json(json!({
                "name": "host-a",
                "region": "nyc1",
                "size": "s-1vcpu-1gb",
                "image": DEFAULT_IMAGE,
                "tags": ["netbox-managed"],
                "ssh_keys": ["ab:cd"]
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"droplet": {"id": 77, "name": "host-a"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/p-9/resources"))
            .and(body_json(json!({"resources": ["do:droplet:77"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": []})))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server)
            .apply(
                &ChangeOperation::create(device("host-a", Origin::Source)),
                &BranchRef::existing("staging", "p-9"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_on_trunk_skips_assignment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"droplet": {"id": 77}})))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server)
            .apply(
                &ChangeOperation::create(device("host-a", Origin::Source)),
                &BranchRef::trunk("main"),
            )
            .await
            .unwrap();
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_failed_assignment_does_not_recreate_droplet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"droplet": {"id": 77}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/p-9/resources"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let change_set =
            ChangeSet::from_operations(vec![ChangeOperation::create(device("host-a", Origin::Source))], 0);
        let report = SyncExecutor::new(&adapter)
            .with_retry(fast_retry(3))
            .apply(&change_set, &BranchRef::existing("staging", "p-9"), SyncMode::Commit)
            .await;

        let entry = &report.entries[0];
        assert_eq!(entry.attempts, 1);
        match &entry.outcome {
            Outcome::Failed(reason) => assert!(reason.contains("created as 77"), "{reason}"),
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_offline_powers_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"droplet": {"id": 77}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/77/actions"))
            .and(body_json(json!({"type": "power_off"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let desired = device("host-a", Origin::Source).with_attr(fields::STATUS, "offline");
        adapter(&server)
            .apply(&ChangeOperation::create(desired), &BranchRef::trunk("main"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_with_unmapped_status_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let desired = device("host-a", Origin::Source).with_attr(fields::STATUS, "planned");
        let err = adapter(&server)
            .apply(&ChangeOperation::create(desired), &BranchRef::trunk("main"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_failed_second_action_does_not_resend_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .and(body_json(json!({"type": "resize", "size": "s-2vcpu-2gb", "disk": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .and(body_json(json!({"type": "power_off"})))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let op = ChangeOperation::update(
            device("host-a", Origin::Source),
            device("host-a", Origin::Target).with_native_id("5"),
            vec![
                FieldDiff {
                    field: String::from(fields::DEVICE_TYPE),
                    old_value: Some(AttrValue::from("s-1vcpu-1gb")),
                    new_value: AttrValue::from("s-2vcpu-2gb"),
                },
                FieldDiff {
                    field: String::from(fields::STATUS),
                    old_value: Some(AttrValue::from("active")),
                    new_value: AttrValue::from("offline"),
                },
            ],
        )
        .unwrap();

        let adapter = adapter(&server);
        let report = SyncExecutor::new(&adapter)
            .with_retry(fast_retry(3))
            .apply(
                &ChangeSet::from_operations(vec![op], 0),
                &BranchRef::trunk("main"),
                SyncMode::Commit,
            )
            .await;

        assert_eq!(report.entries[0].attempts, 1);
        match &report.entries[0].outcome {
            Outcome::Failed(reason) => assert!(reason.contains("resize to s-2vcpu-2gb"), "{reason}"),
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_first_action_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .mount(&server)
            .await;

        let op = ChangeOperation::update(
            device("host-a", Origin::Source),
            device("host-a", Origin::Target).with_native_id("5"),
            vec![FieldDiff {
                field: String::from(fields::STATUS),
                old_value: Some(AttrValue::from("active")),
                new_value: AttrValue::from("offline"),
            }],
        )
        .unwrap();

        let adapter = adapter(&server);
        let report = SyncExecutor::new(&adapter)
            .with_retry(fast_retry(3))
            .apply(
                &ChangeSet::from_operations(vec![op], 0),
                &BranchRef::trunk("main"),
                SyncMode::Commit,
            )
            .await;

        assert!(report.all_applied());
        assert_eq!(report.entries[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_timed_out_action_is_retried_by_executor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(500)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .mount(&server)
            .await;

        let client = DigitalOceanClient::new(&server.uri(), "t", Duration::from_millis(50)).unwrap();
        let adapter = DigitalOceanAdapter::new(client);
        let op = ChangeOperation::update(
            device("host-a", Origin::Source),
            device("host-a", Origin::Target).with_native_id("5"),
            vec![FieldDiff {
                field: String::from(fields::STATUS),
                old_value: Some(AttrValue::from("offline")),
                new_value: AttrValue::from("active"),
            }],
        )
        .unwrap();

        let report = SyncExecutor::new(&adapter)
            .with_retry(fast_retry(3))
            .apply(
                &ChangeSet::from_operations(vec![op], 0),
                &BranchRef::trunk("main"),
                SyncMode::Commit,
            )
            .await;

        assert!(report.all_applied());
        assert_eq!(report.entries[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_update_maps_to_actions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .and(body_json(json!({"type": "resize", "size": "s-2vcpu-2gb", "disk": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/droplets/5/actions"))
            .and(body_json(json!({"type": "power_off"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 2}})))
            .expect(1)
            .mount(&server)
            .await;

        let op = ChangeOperation::update(
            device("host-a", Origin::Source),
            device("host-a", Origin::Target).with_native_id("5"),
            vec![
                FieldDiff {
                    field: String::from(fields::DEVICE_TYPE),
                    old_value: Some(AttrValue::from("s-1vcpu-1gb")),
                    new_value: AttrValue::from("s-2vcpu-2gb"),
                },
                FieldDiff {
                    field: String::from(fields::STATUS),
                    old_value: Some(AttrValue::from("active")),
                    new_value: AttrValue::from("offline"),
                },
            ],
        )
        .unwrap();

        adapter(&server).apply(&op, &BranchRef::trunk("main")).await.unwrap();
    }

    #[tokio::test]
    async fn test_region_change_is_unsupported_and_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let op = ChangeOperation::update(
            device("host-a", Origin::Source),
            device("host-a", Origin::Target).with_native_id("5"),
            vec![FieldDiff {
                field: String::from(fields::SITE),
                old_value: Some(AttrValue::from("ams3")),
                new_value: AttrValue::from("nyc1"),
            }],
        )
        .unwrap();

        let err = adapter(&server).apply(&op, &BranchRef::trunk("main")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unsupported { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/droplets/5"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let op = ChangeOperation::delete(device("host-a", Origin::Target).with_native_id("5"));
        adapter(&server).apply(&op, &BranchRef::trunk("main")).await.unwrap();
    }

    #[tokio::test]
    async fn test_projects_as_branches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"id": "p-1", "name": "default", "is_default": true},
                    {"id": "p-2", "name": "staging", "is_default": false}
                ],
                "links": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/projects"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "project": {"id": "p-3", "name": "feature-x", "is_default": false}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let staging = adapter.find_branch("staging").await.unwrap().unwrap();
        assert_eq!(staging.scope_id(), Some("p-2"));
        assert!(adapter.find_branch("feature-x").await.unwrap().is_none());

        let created = adapter.create_branch("feature-x").await.unwrap();
        assert_eq!(created.scope_id(), Some("p-3"));
    }
}
