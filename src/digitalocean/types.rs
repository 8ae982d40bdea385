//! DigitalOcean API types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    /// Page links, absent on single-page results.
    #[serde(default)]
    pub pages: Option<Pages>,
}

/// Page links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pages {
    /// Absolute URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
}

impl Links {
    /// URL of the next page, if any.
    #[must_use]
    pub fn next(&self) -> Option<&str> {
        self.pages.as_ref().and_then(|p| p.next.as_deref())
    }
}

/// One page of droplets.
#[derive(Debug, Clone, Deserialize)]
pub struct DropletPage {
    /// Droplets, untyped until normalization.
    #[serde(default)]
    pub droplets: Vec<Value>,
    /// Pagination links.
    #[serde(default)]
    pub links: Links,
}

/// Single droplet envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct DropletEnvelope {
    /// The droplet.
    pub droplet: Value,
}

/// A project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project UUID.
    pub id: String,
    /// Project name.
    pub name: String,
}

/// One page of projects.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectPage {
    /// Projects of this page.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Pagination links.
    #[serde(default)]
    pub links: Links,
}

/// Single project envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEnvelope {
    /// The project.
    pub project: Project,
}

/// Droplet creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDropletRequest {
    /// Droplet name.
    pub name: String,
    /// Region slug.
    pub region: String,
    /// Size slug.
    pub size: String,
    /// Image slug.
    pub image: String,
    /// Tags, including the managed tag.
    pub tags: Vec<String>,
    /// SSH key ids or fingerprints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
}

/// Project creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest {
    /// Project name.
    pub name: String,
    /// Project purpose.
    pub purpose: String,
    /// Deployment environment.
    pub environment: String,
    /// Free-text description.
    pub description: String,
}

/// Droplet action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DropletAction {
    /// Change the size, keeping the disk so it can be reverted.
    Resize {
        /// Target size slug.
        size: String,
        /// Whether to grow the disk.
        disk: bool,
    },
    /// Power the droplet on.
    PowerOn,
    /// Power the droplet off.
    PowerOff,
}

impl std::fmt::Display for DropletAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resize { size, .. } => write!(f, "resize to {size}"),
            Self::PowerOn => write!(f, "power on"),
            Self::PowerOff => write!(f, "power off"),
        }
    }
}

/// URN of a droplet, as used in project assignments.
#[must_use]
pub fn droplet_urn(id: &str) -> String {
    format!("do:droplet:{id}")
}
