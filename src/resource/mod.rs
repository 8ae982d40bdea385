//! Canonical resource model and normalization.
//!
//! This module turns the untyped inventory records of NetBox and
//! DigitalOcean into one tagged representation:
//! - Canonical types ([`Resource`], [`ResourceKind`], [`AttrValue`])
//! - Per-system mapping tables and the managed-field profile
//! - The pure [`Normalizer`]

mod normalizer;
pub mod schema;
mod types;

pub use normalizer::Normalizer;
pub use schema::{FieldProfile, fields};
pub use types::{AttrValue, Origin, RawRecord, Resource, ResourceId, ResourceKind, System};
