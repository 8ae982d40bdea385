//! NetBox integration.
//!
//! REST client for the DCIM/IPAM endpoints and the branching plugin, and
//! the adapter that plugs NetBox into the reconciliation engine.

mod adapter;
mod client;
mod types;

pub use adapter::NetBoxAdapter;
pub use client::NetBoxClient;
pub use types::{Branch, Choice, Page};
