//! Canonical resource types shared by every stage after normalization.
//!
//! Nothing downstream of the normalizer inspects NetBox or DigitalOcean
//! payloads; it only sees [`Resource`] values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// External system a record or resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum System {
    /// NetBox source-of-truth.
    NetBox,
    /// DigitalOcean cloud.
    DigitalOcean,
}

/// Which reader produced a resource. Diagnostics only, never identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Produced by the source reader (desired state).
    Source,
    /// Produced by the target reader (observed state).
    Target,
}

/// Shared kind vocabulary.
///
/// Variants are declared in dependency order: a device references a site,
/// a device type and a role, and a device type references a manufacturer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A NetBox site / DigitalOcean region.
    Site,
    /// A hardware or cloud vendor.
    Manufacturer,
    /// The functional role of a device.
    DeviceRole,
    /// A NetBox device type / DigitalOcean droplet size.
    DeviceType,
    /// A NetBox device / DigitalOcean droplet.
    Device,
    /// An IPv4 host address.
    IpAddress,
}

impl ResourceKind {
    /// All kinds in dependency order.
    pub const ALL: [Self; 6] = [
        Self::Site,
        Self::Manufacturer,
        Self::DeviceRole,
        Self::DeviceType,
        Self::Device,
        Self::IpAddress,
    ];

    /// Position in dependency order; lower ranks must exist first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Manufacturer => "manufacturer",
            Self::DeviceRole => "device_role",
            Self::DeviceType => "device_type",
            Self::Device => "device",
            Self::IpAddress => "ip_address",
        }
    }
}

/// Primitive attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String value. The empty string is a real value, not absence.
    Str(String),
}

impl AttrValue {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to a JSON value for request bodies.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Key that matches a desired resource to its observed counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Stable identity within the kind.
    pub identity_key: String,
}

/// Canonical unit of comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Stable, source-independent identity (hostname, address, name).
    pub identity_key: String,
    /// Managed attributes in canonical field-name order.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Reader that produced this resource.
    pub origin: Origin,
    /// Provider-native identifier used to address the object when mutating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,
}

impl Resource {
    /// Creates a resource with no attributes.
    #[must_use]
    pub fn new(kind: ResourceKind, identity_key: impl Into<String>, origin: Origin) -> Self {
        Self {
            kind,
            identity_key: identity_key.into(),
            attributes: BTreeMap::new(),
            origin,
            native_id: None,
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Sets the provider-native identifier.
    #[must_use]
    pub fn with_native_id(mut self, native_id: impl Into<String>) -> Self {
        self.native_id = Some(native_id.into());
        self
    }

    /// Returns the matching key.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        ResourceId {
            kind: self.kind,
            identity_key: self.identity_key.clone(),
        }
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn attr_str(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(AttrValue::as_str)
    }
}

/// Untyped record as returned by a reader, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Kind the reader fetched this record as.
    pub kind: ResourceKind,
    /// Provider payload.
    pub body: serde_json::Value,
    /// Derived from another record and allowed to repeat.
    pub shared: bool,
}

impl RawRecord {
    /// A record fetched directly from an inventory listing.
    #[must_use]
    pub const fn primary(kind: ResourceKind, body: serde_json::Value) -> Self {
        Self {
            kind,
            body,
            shared: false,
        }
    }

    /// A record derived from another record; identical repeats collapse.
    #[must_use]
    pub const fn shared(kind: ResourceKind, body: serde_json::Value) -> Self {
        Self {
            kind,
            body,
            shared: true,
        }
    }
}

impl std::fmt::Display for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NetBox => "NetBox",
            Self::DigitalOcean => "DigitalOcean",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.identity_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_dependency_order() {
        assert!(ResourceKind::Site < ResourceKind::Device);
        assert!(ResourceKind::Manufacturer < ResourceKind::DeviceType);
        assert!(ResourceKind::DeviceType.rank() < ResourceKind::Device.rank());
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let empty = AttrValue::from("");
        assert_eq!(empty.as_str(), Some(""));
        assert_ne!(empty, AttrValue::Bool(false));
    }

    #[test]
    fn test_attr_display() {
        assert_eq!(AttrValue::from("10.0.0.1").to_string(), "\"10.0.0.1\"");
        assert_eq!(AttrValue::Int(4).to_string(), "4");
    }
}
