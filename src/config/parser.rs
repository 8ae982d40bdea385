//! Configuration parser for loading configuration files.
//!
//! This module discovers and loads the optional YAML configuration and the
//! `.env` file, with proper error handling.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::SyncConfig;

/// Configuration file names searched in the working directory and its ancestors.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["netbox-sync.yaml", "netbox-sync.yml"];

/// Directory under the user config dir holding `config.yaml`.
const USER_CONFIG_DIR: &str = "netbox-do-sync";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser;

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read, or is
    /// not valid configuration.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or has unknown keys.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<SyncConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(SyncConfig::default());
        }

        let config: SyncConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        Ok(config)
    }

    /// Loads the explicit file, else the discovered one, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any file is invalid.
    pub fn load(&self, explicit: Option<&Path>, start_dir: &Path) -> Result<(SyncConfig, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((self.load_file(path)?, Some(path.to_path_buf())));
        }

        match find_config_file(start_dir).or_else(user_config_file) {
            Some(path) => Ok((self.load_file(&path)?, Some(path))),
            None => {
                debug!("No configuration file found, using defaults");
                Ok((SyncConfig::default(), None))
            }
        }
    }

    /// Loads a `.env` file from `dir` if present. Existing variables win.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_dotenv(&self, dir: &Path) -> Result<()> {
        let env_path = dir.join(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds a configuration file in `start_dir` or its ancestors.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.is_file() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Returns the per-user configuration file if it exists.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_DIR).join("config.yaml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Direction;
    use crate::error::SyncError;

    #[test]
    fn test_parse_empty_config() {
        let config = ConfigParser::new().parse_yaml("", None).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
netbox:
  url: https://netbox.example.com
  filters:
    tag: cloud
  branch_ready_timeout_secs: 20
digitalocean:
  tag: managed
  image: debian-12-x64
  ssh_keys: ["ab:cd:ef"]
sync:
  direction: digitalocean-to-netbox
  default_branch: staging
  timeout_secs: 15
retry:
  max_attempts: 5
  base_delay_ms: 200
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.netbox.url.as_deref(), Some("https://netbox.example.com"));
        assert_eq!(config.netbox.filters.get("tag").map(String::as_str), Some("cloud"));
        assert_eq!(config.netbox.branch_ready_timeout_secs, 20);
        assert_eq!(config.netbox.branch_poll_interval_ms, 1000);
        assert_eq!(config.digitalocean.tag, "managed");
        assert_eq!(config.sync.direction, Direction::DigitaloceanToNetbox);
        assert_eq!(config.sync.default_branch, "staging");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_delay_ms, 30_000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigParser::new()
            .parse_yaml("sync:\n  dry_run: true\n", None)
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_find_config_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("netbox-sync.yml"), "sync:\n  timeout_secs: 5\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.path().join("netbox-sync.yml"));

        let (config, path) = ConfigParser::new().load(None, &nested).unwrap();
        assert_eq!(config.sync.timeout_secs, 5);
        assert_eq!(path, Some(found));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");

        let err = ConfigParser::new().load(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::FileNotFound { .. })));
    }
}
