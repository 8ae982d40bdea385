//! Static mapping tables from provider payloads to canonical fields.
//!
//! Each [`RecordMapping`] names where a kind's identity, native id and
//! attributes live in one system's JSON. Both systems map onto the same
//! field names, listed in [`fields`].

use std::collections::{BTreeMap, BTreeSet};

use super::types::{ResourceKind, System};

/// Canonical attribute names.
pub mod fields {
    /// Slug of a site, role, type or manufacturer.
    pub const SLUG: &str = "slug";
    /// Free-text description.
    pub const DESCRIPTION: &str = "description";
    /// Manufacturer slug of a device type.
    pub const MANUFACTURER: &str = "manufacturer";
    /// Site (region) slug of a device.
    pub const SITE: &str = "site";
    /// Device type (size) slug of a device.
    pub const DEVICE_TYPE: &str = "device_type";
    /// Role slug of a device.
    pub const ROLE: &str = "role";
    /// Operational status of a device or address.
    pub const STATUS: &str = "status";
}

/// Value rewrite applied after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Use the value as is.
    None,
    /// `10.0.0.1/24` becomes `10.0.0.1`.
    StripPrefixLength,
    /// DigitalOcean droplet status to NetBox device status.
    DropletStatus,
}

/// Where a canonical value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Dotted JSON path with a transform.
    Path(&'static str, Transform),
    /// Constant value implied by the system.
    Const(&'static str),
}

/// One canonical attribute of a mapping.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical field name.
    pub name: &'static str,
    /// Where the value is read from.
    pub source: FieldSource,
    /// Whether absence is a normalization error.
    pub required: bool,
}

/// Mapping of one (system, kind) record shape.
#[derive(Debug, Clone, Copy)]
pub struct RecordMapping {
    /// Kind this mapping produces.
    pub kind: ResourceKind,
    /// Source of the identity key.
    pub identity: FieldSource,
    /// Path of the provider-native id.
    pub native_id: Option<&'static str>,
    /// Attribute sources.
    pub fields: &'static [FieldSpec],
}

const fn path(name: &'static str, path: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        source: FieldSource::Path(path, Transform::None),
        required,
    }
}

const fn constant(name: &'static str, value: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        source: FieldSource::Const(value),
        required: true,
    }
}

const NAME: FieldSource = FieldSource::Path("name", Transform::None);

static NETBOX_MAPPINGS: &[RecordMapping] = &[
    RecordMapping {
        kind: ResourceKind::Site,
        identity: NAME,
        native_id: Some("id"),
        fields: &[path(fields::SLUG, "slug", true)],
    },
    RecordMapping {
        kind: ResourceKind::Manufacturer,
        identity: NAME,
        native_id: Some("id"),
        fields: &[
            path(fields::SLUG, "slug", true),
            path(fields::DESCRIPTION, "description", false),
        ],
    },
    RecordMapping {
        kind: ResourceKind::DeviceRole,
        identity: NAME,
        native_id: Some("id"),
        fields: &[path(fields::SLUG, "slug", true)],
    },
    RecordMapping {
        kind: ResourceKind::DeviceType,
        identity: FieldSource::Path("model", Transform::None),
        native_id: Some("id"),
        fields: &[
            path(fields::SLUG, "slug", true),
            path(fields::MANUFACTURER, "manufacturer.slug", true),
        ],
    },
    RecordMapping {
        kind: ResourceKind::Device,
        identity: NAME,
        native_id: Some("id"),
        fields: &[
            path(fields::SITE, "site.slug", true),
            path(fields::DEVICE_TYPE, "device_type.slug", true),
            path(fields::ROLE, "role.slug", true),
            path(fields::STATUS, "status.value", true),
        ],
    },
    RecordMapping {
        kind: ResourceKind::IpAddress,
        identity: FieldSource::Path("address", Transform::StripPrefixLength),
        native_id: Some("id"),
        fields: &[
            path(fields::STATUS, "status.value", true),
            path(fields::DESCRIPTION, "description", false),
        ],
    },
];

static DIGITALOCEAN_MAPPINGS: &[RecordMapping] = &[
    RecordMapping {
        kind: ResourceKind::Site,
        identity: NAME,
        native_id: Some("slug"),
        fields: &[path(fields::SLUG, "slug", true)],
    },
    RecordMapping {
        kind: ResourceKind::Manufacturer,
        identity: NAME,
        native_id: None,
        fields: &[
            path(fields::SLUG, "slug", true),
            path(fields::DESCRIPTION, "description", false),
        ],
    },
    RecordMapping {
        kind: ResourceKind::DeviceRole,
        identity: NAME,
        native_id: None,
        fields: &[path(fields::SLUG, "slug", true)],
    },
    RecordMapping {
        kind: ResourceKind::DeviceType,
        identity: FieldSource::Path("slug", Transform::None),
        native_id: Some("slug"),
        fields: &[
            path(fields::SLUG, "slug", true),
            constant(fields::MANUFACTURER, "digitalocean"),
        ],
    },
    RecordMapping {
        kind: ResourceKind::Device,
        identity: NAME,
        native_id: Some("id"),
        fields: &[
            path(fields::SITE, "region.slug", true),
            path(fields::DEVICE_TYPE, "size_slug", true),
            constant(fields::ROLE, "droplet"),
            FieldSpec {
                name: fields::STATUS,
                source: FieldSource::Path("status", Transform::DropletStatus),
                required: true,
            },
        ],
    },
    RecordMapping {
        kind: ResourceKind::IpAddress,
        identity: FieldSource::Path("ip_address", Transform::StripPrefixLength),
        native_id: None,
        fields: &[
            constant(fields::STATUS, "active"),
            path(fields::DESCRIPTION, "droplet", false),
        ],
    },
];

/// Looks up the mapping for a system and kind.
#[must_use]
pub fn mapping_for(system: System, kind: ResourceKind) -> Option<&'static RecordMapping> {
    let table = match system {
        System::NetBox => NETBOX_MAPPINGS,
        System::DigitalOcean => DIGITALOCEAN_MAPPINGS,
    };
    table.iter().find(|m| m.kind == kind)
}

/// Resolves a dotted path inside a JSON value.
#[must_use]
pub fn lookup_path<'v>(value: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}

impl Transform {
    /// Applies the transform to a string value.
    #[must_use]
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::None => value.to_string(),
            Self::StripPrefixLength => value
                .split_once('/')
                .map_or(value, |(host, _)| host)
                .to_string(),
            Self::DropletStatus => match value {
                "off" => String::from("offline"),
                "new" => String::from("planned"),
                "archive" => String::from("decommissioning"),
                other => other.to_string(),
            },
        }
    }
}

/// Kinds and fields a target manages. Everything else is ignored on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldProfile {
    kinds: BTreeMap<ResourceKind, BTreeSet<&'static str>>,
}

impl FieldProfile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a managed kind with its managed fields.
    #[must_use]
    pub fn with_kind(mut self, kind: ResourceKind, fields: &[&'static str]) -> Self {
        self.kinds
            .entry(kind)
            .or_default()
            .extend(fields.iter().copied());
        self
    }

    /// Profile managing every mapped field of every kind.
    #[must_use]
    pub fn all() -> Self {
        ResourceKind::ALL.iter().fold(Self::new(), |profile, kind| {
            let names: Vec<&'static str> = NETBOX_MAPPINGS
                .iter()
                .filter(|m| m.kind == *kind)
                .flat_map(|m| m.fields.iter().map(|f| f.name))
                .collect();
            profile.with_kind(*kind, &names)
        })
    }

    /// Managed kinds in dependency order.
    #[must_use]
    pub fn kinds(&self) -> BTreeSet<ResourceKind> {
        self.kinds.keys().copied().collect()
    }

    /// Returns true if the kind is managed.
    #[must_use]
    pub fn manages(&self, kind: ResourceKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Returns true if the field of a kind is managed.
    #[must_use]
    pub fn manages_field(&self, kind: ResourceKind, field: &str) -> bool {
        self.kinds.get(&kind).is_some_and(|f| f.contains(field))
    }
}
