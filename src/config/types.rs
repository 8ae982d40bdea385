//! Configuration file types.
//!
//! This module defines the structs that map to `netbox-sync.yaml`. Every
//! section and field is optional; absent values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::digitalocean::{DEFAULT_IMAGE, DEFAULT_MANAGED_TAG, DIGITALOCEAN_API_URL, DropletDefaults};
use crate::planner::{DEFAULT_TRUNK, RetryPolicy};
use crate::resource::System;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// NetBox connection and branching settings.
    pub netbox: NetBoxConfig,
    /// DigitalOcean connection and droplet settings.
    pub digitalocean: DigitalOceanConfig,
    /// Run settings.
    pub sync: RunConfig,
    /// Retry settings for transient failures.
    pub retry: RetryConfig,
}

/// NetBox settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NetBoxConfig {
    /// Base URL of the NetBox instance.
    pub url: Option<String>,
    /// Query filters for device and IP address listings (e.g. `tag: cloud`).
    pub filters: BTreeMap<String, String>,
    /// How long to wait for a branch to become ready.
    pub branch_ready_timeout_secs: u64,
    /// Delay between branch status polls.
    pub branch_poll_interval_ms: u64,
}

impl Default for NetBoxConfig {
    fn default() -> Self {
        Self {
            url: None,
            filters: BTreeMap::new(),
            branch_ready_timeout_secs: 10,
            branch_poll_interval_ms: 1000,
        }
    }
}

/// DigitalOcean settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DigitalOceanConfig {
    /// API base URL.
    pub api_url: String,
    /// Tag marking managed droplets.
    pub tag: String,
    /// Image for new droplets.
    pub image: String,
    /// SSH key ids or fingerprints for new droplets.
    pub ssh_keys: Vec<String>,
    /// Purpose of projects created as branches.
    pub project_purpose: String,
    /// Environment of projects created as branches.
    pub project_environment: String,
}

impl Default for DigitalOceanConfig {
    fn default() -> Self {
        let defaults = DropletDefaults::default();
        Self {
            api_url: String::from(DIGITALOCEAN_API_URL),
            tag: String::from(DEFAULT_MANAGED_TAG),
            image: String::from(DEFAULT_IMAGE),
            ssh_keys: Vec::new(),
            project_purpose: defaults.project_purpose,
            project_environment: defaults.project_environment,
        }
    }
}

impl DigitalOceanConfig {
    /// Droplet and project creation defaults.
    #[must_use]
    pub fn droplet_defaults(&self) -> DropletDefaults {
        DropletDefaults {
            tag: self.tag.clone(),
            image: self.image.clone(),
            ssh_keys: self.ssh_keys.clone(),
            project_purpose: self.project_purpose.clone(),
            project_environment: self.project_environment.clone(),
        }
    }
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Which system holds desired state.
    pub direction: Direction,
    /// Branch used when `--branch` is not given.
    pub default_branch: String,
    /// Name of the unscoped trunk branch.
    pub trunk_branch: String,
    /// Per-call HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            default_branch: String::from(DEFAULT_TRUNK),
            trunk_branch: String::from(DEFAULT_TRUNK),
            timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Per-call HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Converts to a retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Sync direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// NetBox is desired state; droplets are created, resized and deleted.
    #[default]
    NetboxToDigitalocean,
    /// DigitalOcean is desired state; NetBox objects are written to a branch.
    DigitaloceanToNetbox,
}

impl Direction {
    /// System holding desired state.
    #[must_use]
    pub const fn source(self) -> System {
        match self {
            Self::NetboxToDigitalocean => System::NetBox,
            Self::DigitaloceanToNetbox => System::DigitalOcean,
        }
    }

    /// System being reconciled.
    #[must_use]
    pub const fn target(self) -> System {
        match self {
            Self::NetboxToDigitalocean => System::DigitalOcean,
            Self::DigitaloceanToNetbox => System::NetBox,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source(), self.target())
    }
}
