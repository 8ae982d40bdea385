//! Resource normalizer.
//!
//! Maps raw provider records into canonical [`Resource`] values. Pure: no
//! I/O and no side effects. A field that is absent (or `null`) in the payload
//! is left out of the resource entirely, which downstream means "not managed";
//! an empty string is kept as a real value.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::NormalizationError;

use super::schema::{FieldProfile, FieldSource, RecordMapping, lookup_path, mapping_for};
use super::types::{AttrValue, Origin, RawRecord, Resource, ResourceId, System};

/// Normalizer for one system's records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// System the records come from.
    system: System,
    /// Reader role, stamped on every resource.
    origin: Origin,
    /// Kinds and fields retained.
    profile: FieldProfile,
}

impl Normalizer {
    /// Creates a normalizer.
    #[must_use]
    pub const fn new(system: System, origin: Origin, profile: FieldProfile) -> Self {
        Self {
            system,
            origin,
            profile,
        }
    }

    /// Normalizes a batch of raw records.
    ///
    /// Records of kinds outside the profile are dropped. The result is ordered
    /// by kind (dependency order), then identity key.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, a value is not a
    /// primitive, or two records claim the same identity with different data.
    pub fn normalize(&self, records: &[RawRecord]) -> Result<Vec<Resource>, NormalizationError> {
        let mut by_id: BTreeMap<ResourceId, (Resource, bool)> = BTreeMap::new();

        for (position, record) in records.iter().enumerate() {
            if !self.profile.manages(record.kind) {
                continue;
            }

            let mapping = mapping_for(self.system, record.kind).ok_or(
                NormalizationError::UnmappedKind {
                    system: self.system,
                    kind: record.kind,
                },
            )?;

            let resource = self.normalize_record(mapping, record, position)?;
            let id = resource.id();

            match by_id.get(&id) {
                None => {
                    by_id.insert(id, (resource, record.shared));
                }
                Some((existing, existing_shared))
                    if *existing_shared
                        && record.shared
                        && existing.attributes == resource.attributes =>
                {
                    debug!("Collapsed repeated {} '{}'", id.kind, id.identity_key);
                }
                Some(_) => {
                    return Err(NormalizationError::DuplicateIdentity {
                        system: self.system,
                        kind: id.kind,
                        identity_key: id.identity_key,
                    });
                }
            }
        }

        debug!(
            "Normalized {} {} records into {} resources",
            records.len(),
            self.system,
            by_id.len()
        );

        Ok(by_id.into_values().map(|(resource, _)| resource).collect())
    }

    /// Normalizes a single record.
    fn normalize_record(
        &self,
        mapping: &RecordMapping,
        record: &RawRecord,
        position: usize,
    ) -> Result<Resource, NormalizationError> {
        let locator = format!("#{position}");

        let identity_key = match self.extract(mapping, &record.body, mapping.identity, &locator, "identity")? {
            Some(AttrValue::Str(s)) if !s.is_empty() => s,
            Some(AttrValue::Int(i)) => i.to_string(),
            _ => {
                return Err(NormalizationError::MissingField {
                    system: self.system,
                    kind: mapping.kind,
                    field: source_label(mapping.identity).to_string(),
                    record: locator,
                });
            }
        };

        let mut resource = Resource::new(mapping.kind, identity_key.clone(), self.origin);

        if let Some(id_path) = mapping.native_id {
            resource.native_id = lookup_path(&record.body, id_path).and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        }

        for spec in mapping.fields {
            if !self.profile.manages_field(mapping.kind, spec.name) {
                continue;
            }

            match self.extract(mapping, &record.body, spec.source, &identity_key, spec.name)? {
                Some(value) => {
                    resource.attributes.insert(spec.name.to_string(), value);
                }
                None if spec.required => {
                    return Err(NormalizationError::MissingField {
                        system: self.system,
                        kind: mapping.kind,
                        field: source_label(spec.source).to_string(),
                        record: identity_key,
                    });
                }
                None => {}
            }
        }

        Ok(resource)
    }

    /// Extracts and converts one value.
    fn extract(
        &self,
        mapping: &RecordMapping,
        body: &serde_json::Value,
        source: FieldSource,
        identity_key: &str,
        field: &str,
    ) -> Result<Option<AttrValue>, NormalizationError> {
        let (path, transform) = match source {
            FieldSource::Const(value) => return Ok(Some(AttrValue::from(value))),
            FieldSource::Path(path, transform) => (path, transform),
        };

        let Some(value) = lookup_path(body, path) else {
            return Ok(None);
        };

        let unsupported = || NormalizationError::UnsupportedValue {
            system: self.system,
            kind: mapping.kind,
            identity_key: identity_key.to_string(),
            field: field.to_string(),
        };

        match value {
            serde_json::Value::String(s) => Ok(Some(AttrValue::Str(transform.apply(s)))),
            serde_json::Value::Bool(b) => Ok(Some(AttrValue::Bool(*b))),
            serde_json::Value::Number(n) => n.as_i64().map(AttrValue::Int).map(Some).ok_or_else(unsupported),
            _ => Err(unsupported()),
        }
    }
}

/// Describes a field source for error messages.
const fn source_label(source: FieldSource) -> &'static str {
    match source {
        FieldSource::Path(path, _) => path,
        FieldSource::Const(value) => value,
    }
}
