//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Discovering and parsing `netbox-sync.yaml`
//! - Validation of configuration values
//! - Resolving flags, environment and file values into run settings

mod parser;
mod settings;
mod types;
mod validator;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, user_config_file};
pub use settings::{
    DIGITALOCEAN_TOKEN_ENV, NETBOX_TOKEN_ENV, NETBOX_URL_ENV, Overrides, Settings,
};
pub use types::{DigitalOceanConfig, Direction, NetBoxConfig, RetryConfig, RunConfig, SyncConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, check_url};
