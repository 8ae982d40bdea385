//! netbox-do-sync CLI entrypoint.
//!
//! This is the main entrypoint for the netbox-do-sync command-line tool.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use netbox_do_sync::cli::{Cli, LogFormat, OutputFormatter};
use netbox_do_sync::config::{ConfigParser, ConfigValidator, Direction, Settings};
use netbox_do_sync::digitalocean::{DigitalOceanAdapter, DigitalOceanClient};
use netbox_do_sync::error::Result;
use netbox_do_sync::netbox::{NetBoxAdapter, NetBoxClient};
use netbox_do_sync::reconciler::{Reconciler, SyncOutcome, SyncRequest};

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when operations failed or the run was cancelled.
const EXIT_PARTIAL: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    // a .env in the working directory or an ancestor; missing is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.log_format);

    let formatter = OutputFormatter::new(cli.output);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(outcome) => {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{}", formatter.format_outcome(&outcome));
            if outcome.is_partial() {
                ExitCode::from(EXIT_PARTIAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Loads settings, wires the adapters for the direction, and runs once.
async fn run(cli: &Cli) -> Result<SyncOutcome> {
    let parser = ConfigParser::new();
    let cwd = std::env::current_dir()?;
    let (config, source_file) = parser.load(cli.config.as_deref(), &cwd)?;

    if let Some(dir) = source_file.as_deref().and_then(std::path::Path::parent) {
        parser.load_dotenv(dir)?;
    }

    let validation = ConfigValidator::new().validate(&config)?;
    debug!("Configuration has {} warnings", validation.warnings.len());

    let settings = Settings::resolve(config, source_file, cli.overrides(), |key| std::env::var(key).ok())?;
    debug!("Resolved settings: {settings:?}");

    let retry = settings.retry_policy();

    let netbox = NetBoxAdapter::new(
        NetBoxClient::new(&settings.netbox_url, &settings.netbox_token, settings.timeout())?.with_retry(retry),
    )
    .with_filters(settings.netbox_filters())
    .with_branch_timing(settings.branch_ready_timeout(), settings.branch_poll_interval());

    let digitalocean = DigitalOceanAdapter::new(
        DigitalOceanClient::new(
            &settings.config.digitalocean.api_url,
            &settings.digitalocean_token,
            settings.timeout(),
        )?
        .with_retry(retry),
    )
    .with_defaults(settings.config.digitalocean.droplet_defaults());

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_cancel_listener(Arc::clone(&cancel));

    let reconciler = match settings.direction {
        Direction::NetboxToDigitalocean => {
            Reconciler::new(&netbox, &digitalocean, &digitalocean, &digitalocean)
        }
        Direction::DigitaloceanToNetbox => Reconciler::new(&digitalocean, &netbox, &netbox, &netbox),
    }
    .with_retry(retry)
    .with_trunk(settings.config.sync.trunk_branch.clone())
    .with_cancel_flag(cancel);

    let request = SyncRequest {
        branch: settings.branch.clone(),
        force: cli.force,
        mode: cli.mode(),
        expect_digest: cli.expect_digest.clone(),
    };

    info!(
        "Starting {} ({}) on branch '{}'",
        settings.direction, request.mode, request.branch
    );

    reconciler.run(&request).await
}

/// Sets `cancel` on the first Ctrl-C and exits on the second.
fn spawn_cancel_listener(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, &cancel).await {
            std::process::exit(i32::from(EXIT_PARTIAL));
        }
    });
}

/// Waits for interrupts from `interrupt`. The first sets `cancel`; returns
/// true once a second one arrives. Returns false if signals cannot be
/// received.
async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: &AtomicBool) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupt received; finishing the current operation (press Ctrl-C again to abort)");
    cancel.store(true, Ordering::SeqCst);

    if interrupt().await.is_err() {
        return false;
    }
    error!("Second interrupt received; aborting");
    true
}
