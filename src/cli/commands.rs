//! CLI argument definitions.
//!
//! This module defines the command-line flags using clap.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::config::{Direction, Overrides};
use crate::planner::SyncMode;

/// netbox-do-sync - Reconcile NetBox devices with DigitalOcean droplets.
#[derive(Parser, Debug)]
#[command(name = "netbox-do-sync")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["dry_run", "sync"])))]
pub struct Cli {
    /// Compute and print the change set without mutating anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Apply the change set to the target system.
    #[arg(long)]
    pub sync: bool,

    /// Branch to read and write (defaults to `sync.default_branch`).
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Create the branch if it does not exist.
    #[arg(short, long)]
    pub force: bool,

    /// NetBox base URL [env: NETBOX_URL].
    #[arg(long)]
    pub netbox_url: Option<String>,

    /// NetBox API token [env: NETBOX_API_TOKEN].
    #[arg(long)]
    pub netbox_token: Option<String>,

    /// DigitalOcean API token [env: DIGITAL_OCEAN_API_TOKEN].
    #[arg(long = "digital-ocean-token")]
    pub digitalocean_token: Option<String>,

    /// Which system holds desired state.
    #[arg(long, value_enum)]
    pub direction: Option<Direction>,

    /// Path to the configuration file.
    #[arg(short, long, env = "NETBOX_DO_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Refuse to sync unless the change set digest starts with this value.
    #[arg(long, value_name = "HEX")]
    pub expect_digest: Option<String>,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (text, json).
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested run mode.
    #[must_use]
    pub const fn mode(&self) -> SyncMode {
        if self.sync {
            SyncMode::Commit
        } else {
            SyncMode::DryRun
        }
    }

    /// Flag values that take precedence over environment and file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            netbox_url: self.netbox_url.clone(),
            netbox_token: self.netbox_token.clone(),
            digitalocean_token: self.digitalocean_token.clone(),
            direction: self.direction,
            branch: self.branch.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Cli::try_parse_from(["netbox-do-sync"]).is_err());
        assert!(Cli::try_parse_from(["netbox-do-sync", "--dry-run", "--sync"]).is_err());
    }

    #[test]
    fn test_sync_with_branch() {
        let cli = Cli::try_parse_from([
            "netbox-do-sync",
            "--sync",
            "-b",
            "feature",
            "-f",
            "--direction",
            "digitalocean-to-netbox",
            "--digital-ocean-token",
            "t",
        ])
        .unwrap();

        assert_eq!(cli.mode(), SyncMode::Commit);
        assert!(cli.force);

        let overrides = cli.overrides();
        assert_eq!(overrides.branch.as_deref(), Some("feature"));
        assert_eq!(overrides.direction, Some(Direction::DigitaloceanToNetbox));
        assert_eq!(overrides.digitalocean_token.as_deref(), Some("t"));
        assert!(overrides.netbox_token.is_none());
    }

    #[test]
    fn test_dry_run_defaults() {
        let cli = Cli::try_parse_from(["netbox-do-sync", "--dry-run", "--output", "json"]).unwrap();
        assert_eq!(cli.mode(), SyncMode::DryRun);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.branch.is_none());
        assert!(!cli.force);
    }
}
