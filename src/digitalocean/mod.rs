//! DigitalOcean integration.
//!
//! REST client for droplets, droplet actions and projects, and the adapter
//! that plugs DigitalOcean into the reconciliation engine.

mod adapter;
mod client;
mod types;

pub use adapter::{DEFAULT_IMAGE, DEFAULT_MANAGED_TAG, DigitalOceanAdapter, DropletDefaults};
pub use client::{DIGITALOCEAN_API_URL, DigitalOceanClient};
pub use types::{DropletAction, Project};
