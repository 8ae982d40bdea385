//! Run settings resolved from flags, environment, file and defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::planner::RetryPolicy;

use super::types::{Direction, SyncConfig};
use super::validator::check_url;

/// Environment variable holding the NetBox URL.
pub const NETBOX_URL_ENV: &str = "NETBOX_URL";
/// Environment variable holding the NetBox API token.
pub const NETBOX_TOKEN_ENV: &str = "NETBOX_API_TOKEN";
/// Environment variable holding the DigitalOcean API token.
pub const DIGITALOCEAN_TOKEN_ENV: &str = "DIGITAL_OCEAN_API_TOKEN";

/// Values given on the command line. `None` means not given.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--netbox-url`.
    pub netbox_url: Option<String>,
    /// `--netbox-token`.
    pub netbox_token: Option<String>,
    /// `--digital-ocean-token`.
    pub digitalocean_token: Option<String>,
    /// `--direction`.
    pub direction: Option<Direction>,
    /// `--branch`.
    pub branch: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct Settings {
    /// NetBox base URL.
    pub netbox_url: String,
    /// NetBox API token.
    pub netbox_token: String,
    /// DigitalOcean API token.
    pub digitalocean_token: String,
    /// Sync direction.
    pub direction: Direction,
    /// Branch to read and write.
    pub branch: String,
    /// File the configuration came from, if any.
    pub source_file: Option<PathBuf>,
    /// The file configuration with defaults applied.
    pub config: SyncConfig,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("netbox_url", &self.netbox_url)
            .field("netbox_token", &"<redacted>")
            .field("digitalocean_token", &"<redacted>")
            .field("direction", &self.direction)
            .field("branch", &self.branch)
            .field("source_file", &self.source_file)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Resolves settings with precedence flag > environment > file > default.
    ///
    /// `env` looks up environment variables; pass `|k| std::env::var(k).ok()`
    /// outside tests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` when a token or the NetBox URL
    /// is not supplied anywhere, or a validation error for a malformed URL.
    pub fn resolve(
        config: SyncConfig,
        source_file: Option<PathBuf>,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let lookup = |flag: Option<String>, var: &str| flag.or_else(|| env(var)).filter(|v| !v.trim().is_empty());

        let netbox_url = lookup(overrides.netbox_url, NETBOX_URL_ENV)
            .or_else(|| config.netbox.url.clone())
            .ok_or_else(|| ConfigError::missing("NetBox URL", "--netbox-url", NETBOX_URL_ENV))?;
        check_url(&netbox_url).map_err(|message| ConfigError::validation(message, "netbox.url"))?;

        let netbox_token = lookup(overrides.netbox_token, NETBOX_TOKEN_ENV)
            .ok_or_else(|| ConfigError::missing("NetBox API token", "--netbox-token", NETBOX_TOKEN_ENV))?;
        let digitalocean_token = lookup(overrides.digitalocean_token, DIGITALOCEAN_TOKEN_ENV).ok_or_else(|| {
            ConfigError::missing(
                "DigitalOcean API token",
                "--digital-ocean-token",
                DIGITALOCEAN_TOKEN_ENV,
            )
        })?;

        let direction = overrides.direction.unwrap_or(config.sync.direction);
        let branch = overrides
            .branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| config.sync.default_branch.clone());

        Ok(Self {
            netbox_url,
            netbox_token,
            digitalocean_token,
            direction,
            branch,
            source_file,
            config,
        })
    }

    /// Per-call HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.config.sync.timeout()
    }

    /// Retry policy for reads and operations.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.config.retry.policy()
    }

    /// NetBox listing filters as query pairs.
    #[must_use]
    pub fn netbox_filters(&self) -> Vec<(String, String)> {
        self.config
            .netbox
            .filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// How long to wait for a NetBox branch to become ready.
    #[must_use]
    pub const fn branch_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.config.netbox.branch_ready_timeout_secs)
    }

    /// Delay between NetBox branch status polls.
    #[must_use]
    pub const fn branch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.netbox.branch_poll_interval_ms)
    }
}
