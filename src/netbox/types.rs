//! NetBox REST API types.
//!
//! Inventory objects stay untyped (`serde_json::Value`) until the
//! normalizer sees them; only the envelopes and the branching plugin
//! objects are modelled here.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Total number of objects.
    #[serde(default)]
    pub count: u64,
    /// Absolute URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
    /// Objects of this page.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Choice field (`{"value": "ready", "label": "Ready"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Machine value.
    pub value: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
}

/// A branch of the NetBox branching plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Numeric id.
    pub id: u64,
    /// Branch name.
    pub name: String,
    /// Schema id sent in the `X-NetBox-Branch` header.
    pub schema_id: String,
    /// Provisioning status.
    #[serde(default)]
    pub status: Choice,
}

impl Branch {
    /// Returns true once the branch can be written to.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.value == "ready"
    }
}

/// Branch creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateBranchRequest {
    /// Branch name.
    pub name: String,
    /// Free-text description.
    pub description: String,
}

/// Object with only an id, as returned by slug lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    /// Numeric id.
    pub id: u64,
}

/// REST endpoint (relative to `/api/`) of a kind.
#[must_use]
pub const fn endpoint(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Site => "dcim/sites",
        ResourceKind::Manufacturer => "dcim/manufacturers",
        ResourceKind::DeviceRole => "dcim/device-roles",
        ResourceKind::DeviceType => "dcim/device-types",
        ResourceKind::Device => "dcim/devices",
        ResourceKind::IpAddress => "ipam/ip-addresses",
    }
}

/// Field naming the primary identity in request bodies.
#[must_use]
pub const fn identity_field(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::DeviceType => "model",
        ResourceKind::IpAddress => "address",
        _ => "name",
    }
}

/// Kind a foreign-key field refers to, if the field is a reference.
#[must_use]
pub fn reference_kind(field: &str) -> Option<ResourceKind> {
    match field {
        "site" => Some(ResourceKind::Site),
        "manufacturer" => Some(ResourceKind::Manufacturer),
        "role" => Some(ResourceKind::DeviceRole),
        "device_type" => Some(ResourceKind::DeviceType),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_ready() {
        let branch: Branch = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "feature-x",
            "schema_id": "td5smq0f",
            "status": {"value": "provisioning", "label": "Provisioning"}
        }))
        .unwrap();

        assert!(!branch.is_ready());
        assert_eq!(branch.schema_id, "td5smq0f");
    }

    #[test]
    fn test_references() {
        assert_eq!(reference_kind("device_type"), Some(ResourceKind::DeviceType));
        assert_eq!(reference_kind("status"), None);
        assert_eq!(endpoint(ResourceKind::DeviceRole), "dcim/device-roles");
    }
}
