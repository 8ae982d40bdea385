//! Configuration validation.
//!
//! Checks file values for consistency before any remote call is made.

use crate::error::{ConfigError, Result, SyncError};
use tracing::{debug, warn};

use super::types::{DigitalOceanConfig, NetBoxConfig, RetryConfig, RunConfig, SyncConfig};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for sync configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &SyncConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_netbox(&config.netbox, &mut result);
        Self::validate_digitalocean(&config.digitalocean, &mut result);
        Self::validate_run(&config.sync, &mut result);
        Self::validate_retry(&config.retry, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if let Some(first_error) = result.errors.first() {
            Err(SyncError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        } else {
            debug!("Configuration validation passed");
            Ok(result)
        }
    }

    fn validate_netbox(netbox: &NetBoxConfig, result: &mut ValidationResult) {
        if let Some(url) = &netbox.url
            && let Err(message) = check_url(url)
        {
            result.error("netbox.url", message);
        }

        if netbox.filters.keys().any(|key| key.trim().is_empty()) {
            result.error("netbox.filters", "Filter names cannot be empty");
        }

        if netbox.branch_poll_interval_ms == 0 {
            result.error("netbox.branch_poll_interval_ms", "Poll interval must be positive");
        }
        if netbox.branch_poll_interval_ms > netbox.branch_ready_timeout_secs.saturating_mul(1000) {
            result.warnings.push(String::from(
                "netbox.branch_poll_interval_ms exceeds the branch ready timeout; branches get a single status check",
            ));
        }
    }

    fn validate_digitalocean(digitalocean: &DigitalOceanConfig, result: &mut ValidationResult) {
        if let Err(message) = check_url(&digitalocean.api_url) {
            result.error("digitalocean.api_url", message);
        }

        if digitalocean.tag.trim().is_empty() {
            result.error(
                "digitalocean.tag",
                "Managed tag cannot be empty; it selects which droplets are reconciled",
            );
        } else if !is_valid_tag(&digitalocean.tag) {
            result.error(
                "digitalocean.tag",
                format!(
                    "Tag '{}' is invalid. Use letters, digits, colons, dashes and underscores.",
                    digitalocean.tag
                ),
            );
        }

        if digitalocean.image.trim().is_empty() {
            result.error("digitalocean.image", "Image cannot be empty");
        }
    }

    fn validate_run(run: &RunConfig, result: &mut ValidationResult) {
        if run.default_branch.trim().is_empty() {
            result.error("sync.default_branch", "Default branch cannot be empty");
        }
        if run.trunk_branch.trim().is_empty() {
            result.error("sync.trunk_branch", "Trunk branch cannot be empty");
        }
        if run.timeout_secs == 0 {
            result.error("sync.timeout_secs", "Timeout must be positive");
        }
    }

    fn validate_retry(retry: &RetryConfig, result: &mut ValidationResult) {
        if retry.max_attempts == 0 {
            result.error("retry.max_attempts", "At least one attempt is required");
        } else if retry.max_attempts == 1 {
            result
                .warnings
                .push(String::from("retry.max_attempts is 1; transient failures will not be retried"));
        }

        if retry.base_delay_ms > retry.max_delay_ms {
            result.error(
                "retry.base_delay_ms",
                format!(
                    "Base delay ({}ms) exceeds max delay ({}ms)",
                    retry.base_delay_ms, retry.max_delay_ms
                ),
            );
        }
    }
}

/// Checks that `url` is an absolute http(s) URL.
///
/// # Errors
///
/// Returns a message describing the problem.
pub fn check_url(url: &str) -> std::result::Result<(), String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| format!("URL '{url}' must start with http:// or https://"))?;

    if rest.trim_matches('/').is_empty() {
        return Err(format!("URL '{url}' has no host"));
    }

    Ok(())
}

/// DigitalOcean tag names: letters, digits, `:`, `-` and `_`, at most 255 chars.
fn is_valid_tag(tag: &str) -> bool {
    tag.len() <= 255
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_'))
}
