//! Diff engine for comparing desired vs observed state.
//!
//! This module computes the change set that turns the observed inventory
//! on the target into the desired inventory from the source.

use std::collections::BTreeMap;
use tracing::debug;

use super::plan::{ChangeOperation, ChangeSet, FieldDiff};
use crate::error::InvariantViolation;
use crate::resource::{Resource, ResourceId};

/// Engine for computing diffs between desired and observed states.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the change set between desired and observed resources.
    ///
    /// Only fields present on the desired side are compared; a field the
    /// source does not carry is not managed and never produces a diff.
    ///
    /// # Errors
    ///
    /// Returns an error if either side contains a resource with an empty
    /// identity or two resources with the same identity.
    pub fn compute_diff(
        &self,
        desired: &[Resource],
        observed: &[Resource],
    ) -> Result<ChangeSet, InvariantViolation> {
        let desired_by_id = Self::index(desired)?;
        let observed_by_id = Self::index(observed)?;

        let mut operations = Vec::new();
        let mut unchanged = 0;

        for (id, wanted) in &desired_by_id {
            match observed_by_id.get(id) {
                None => {
                    debug!("{id} needs to be created");
                    operations.push(ChangeOperation::create((*wanted).clone()));
                }
                Some(current) => {
                    let field_diffs = Self::compare_fields(wanted, current);
                    if field_diffs.is_empty() {
                        unchanged += 1;
                    } else {
                        debug!("{id} needs update ({} fields)", field_diffs.len());
                        operations.push(ChangeOperation::update(
                            (*wanted).clone(),
                            (*current).clone(),
                            field_diffs,
                        )?);
                    }
                }
            }
        }

        for (id, current) in &observed_by_id {
            if !desired_by_id.contains_key(id) {
                debug!("{id} is not desired, deleting");
                operations.push(ChangeOperation::delete((*current).clone()));
            }
        }

        Ok(ChangeSet::from_operations(operations, unchanged))
    }

    /// Indexes resources by identity, rejecting malformed input.
    fn index(resources: &[Resource]) -> Result<BTreeMap<ResourceId, &Resource>, InvariantViolation> {
        let mut by_id = BTreeMap::new();

        for resource in resources {
            if resource.identity_key.is_empty() {
                return Err(InvariantViolation::MissingIdentity {
                    kind: resource.kind,
                });
            }
            if by_id.insert(resource.id(), resource).is_some() {
                return Err(InvariantViolation::DuplicateIdentity {
                    kind: resource.kind,
                    identity_key: resource.identity_key.clone(),
                });
            }
        }

        Ok(by_id)
    }

    /// Compares the desired fields against the observed ones, in field-name order.
    fn compare_fields(desired: &Resource, observed: &Resource) -> Vec<FieldDiff> {
        desired
            .attributes
            .iter()
            .filter_map(|(field, wanted)| {
                let current = observed.attributes.get(field);
                (current != Some(wanted)).then(|| FieldDiff {
                    field: field.clone(),
                    old_value: current.cloned(),
                    new_value: wanted.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::OpKind;
    use crate::resource::{AttrValue, Origin, ResourceKind};

    fn desired(name: &str, ip: &str) -> Resource {
        Resource::new(ResourceKind::Device, name, Origin::Source).with_attr("ip", ip)
    }

    fn observed(name: &str, ip: &str) -> Resource {
        Resource::new(ResourceKind::Device, name, Origin::Target).with_attr("ip", ip)
    }

    #[test]
    fn test_host_scenario() {
        let engine = DiffEngine::new();

        let set = engine.compute_diff(&[desired("host-a", "10.0.0.1")], &[]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.operations()[0].op_kind, OpKind::Create);
        assert_eq!(set.operations()[0].identity_key, "host-a");

        let set = engine
            .compute_diff(&[desired("host-a", "10.0.0.1")], &[observed("host-a", "10.0.0.2")])
            .unwrap();
        assert_eq!(set.len(), 1);
        let op = &set.operations()[0];
        assert_eq!(op.op_kind, OpKind::Update);
        assert_eq!(
            op.field_diffs,
            vec![FieldDiff {
                field: String::from("ip"),
                old_value: Some(AttrValue::from("10.0.0.2")),
                new_value: AttrValue::from("10.0.0.1"),
            }]
        );

        let set = engine.compute_diff(&[], &[observed("host-a", "10.0.0.2")]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.operations()[0].op_kind, OpKind::Delete);
    }

    #[test]
    fn test_equal_sides_produce_empty_set() {
        let engine = DiffEngine::new();
        let set = engine
            .compute_diff(
                &[desired("host-a", "10.0.0.1"), desired("host-b", "10.0.0.2")],
                &[observed("host-b", "10.0.0.2"), observed("host-a", "10.0.0.1")],
            )
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(set.unchanged(), 2);
    }

    #[test]
    fn test_deterministic_regardless_of_input_order() {
        let engine = DiffEngine::new();
        let wanted = vec![
            desired("host-c", "10.0.0.3"),
            desired("host-a", "10.0.0.1"),
            desired("host-b", "10.0.0.9"),
        ];
        let current = vec![observed("host-b", "10.0.0.2"), observed("host-z", "10.0.0.26")];

        let first = engine.compute_diff(&wanted, &current).unwrap();
        let mut reversed = wanted.clone();
        reversed.reverse();
        let second = engine.compute_diff(&reversed, &current).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.render_lines(), second.render_lines());
    }

    #[test]
    fn test_class_ordering() {
        let engine = DiffEngine::new();
        let set = engine
            .compute_diff(
                &[desired("host-a", "10.0.0.1"), desired("host-b", "10.0.0.9")],
                &[observed("host-b", "10.0.0.2"), observed("host-z", "10.0.0.26")],
            )
            .unwrap();

        let kinds: Vec<_> = set.operations().iter().map(|op| op.op_kind).collect();
        assert_eq!(kinds, [OpKind::Delete, OpKind::Update, OpKind::Create]);
    }

    #[test]
    fn test_absent_desired_field_is_ignored() {
        let engine = DiffEngine::new();
        let wanted = Resource::new(ResourceKind::Device, "host-a", Origin::Source);
        let set = engine
            .compute_diff(&[wanted], &[observed("host-a", "10.0.0.2")])
            .unwrap();

        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_string_differs_from_absent() {
        let engine = DiffEngine::new();
        let wanted = desired("host-a", "");
        let current = Resource::new(ResourceKind::Device, "host-a", Origin::Target);
        let set = engine.compute_diff(&[wanted], &[current]).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.operations()[0].field_diffs[0].old_value, None);
        assert_eq!(set.operations()[0].field_diffs[0].new_value, AttrValue::from(""));
    }

    #[test]
    fn test_same_key_different_kind_is_distinct() {
        let engine = DiffEngine::new();
        let site = Resource::new(ResourceKind::Site, "nyc1", Origin::Source);
        let device = Resource::new(ResourceKind::Device, "nyc1", Origin::Source);

        let set = engine.compute_diff(&[site, device], &[]).unwrap();
        assert_eq!(set.count(OpKind::Create), 2);
    }

    #[test]
    fn test_field_diffs_in_name_order() {
        let engine = DiffEngine::new();
        let wanted = Resource::new(ResourceKind::Device, "host-a", Origin::Source)
            .with_attr("status", "active")
            .with_attr("device_type", "s-2vcpu-2gb")
            .with_attr("site", "nyc1");
        let current = Resource::new(ResourceKind::Device, "host-a", Origin::Target)
            .with_attr("status", "offline")
            .with_attr("device_type", "s-1vcpu-1gb")
            .with_attr("site", "nyc1");

        let set = engine.compute_diff(&[wanted], &[current]).unwrap();
        let fields: Vec<_> = set.operations()[0]
            .field_diffs
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(fields, ["device_type", "status"]);
    }

    #[test]
    fn test_duplicate_identity_is_invariant_violation() {
        let engine = DiffEngine::new();
        let err = engine
            .compute_diff(&[desired("host-a", "10.0.0.1"), desired("host-a", "10.0.0.2")], &[])
            .unwrap_err();

        assert!(matches!(err, InvariantViolation::DuplicateIdentity { .. }));
    }

    #[test]
    fn test_missing_identity_is_invariant_violation() {
        let engine = DiffEngine::new();
        let err = engine.compute_diff(&[], &[observed("", "10.0.0.1")]).unwrap_err();

        assert!(matches!(err, InvariantViolation::MissingIdentity { .. }));
    }
}
