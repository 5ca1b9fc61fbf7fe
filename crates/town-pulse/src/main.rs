mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::Command;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use town_core::{HealthFlags, Snapshot};
use town_snapshot::{LoaderConfig, SnapshotLoader, Store};
use town_sources::DEFAULT_EVENT_LIMIT;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_INTERVAL_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(name = "town-pulse")]
#[command(about = "Read-only snapshot of a multi-agent workspace", long_about = None)]
struct Cli {
    /// Workspace root; defaults to the current directory.
    #[arg(long, env = "GT_ROOT")]
    town_root: Option<PathBuf>,
    /// Seconds between refreshes. 0 refreshes once and exits.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    interval_secs: u64,
    /// Print a single snapshot as JSON and exit.
    #[arg(long, default_value_t = false)]
    once: bool,
    #[arg(long, default_value_t = DEFAULT_EVENT_LIMIT)]
    event_limit: usize,
    /// Per-command time limit; unset lets commands run until cancelled.
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) town_root: PathBuf,
    interval: Duration,
    once: bool,
    event_limit: usize,
    timeout: Option<Duration>,
    health: HealthFlags,
}

impl Config {
    pub(crate) fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            event_limit: self.event_limit,
            health: self.health,
            timeout: self.timeout,
            ..LoaderConfig::new(self.town_root.clone())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let town_root = match &cli.town_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    Ok(Config {
        town_root,
        interval: Duration::from_secs(cli.interval_secs),
        once: cli.once,
        event_limit: cli.event_limit,
        timeout: cli.timeout_secs.map(Duration::from_secs),
        health: resolve_health_flags(),
    })
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

fn resolve_health_flags() -> HealthFlags {
    HealthFlags {
        degraded_mode: env_flag("GT_DEGRADED"),
        patrol_muted: env_flag("GT_PATROL_MUTED"),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_flag("TOWN_LOG_STDOUT") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

/// One line per refresh for the periodic mode.
fn summary_line(snapshot: &Snapshot) -> String {
    let rigs = snapshot
        .status
        .as_ref()
        .map(|status| status.rigs.len())
        .unwrap_or(0);
    let active = match snapshot.status.as_ref() {
        Some(status) if snapshot.active_issues_loaded => status.summary.active_hooks.to_string(),
        Some(status) => format!("{} (stale)", status.summary.active_hooks),
        None => "-".to_string(),
    };
    let mut line = format!(
        "{} {} rigs={} polecats={} active={} mail={} errors={}",
        snapshot.loaded_at.format("%H:%M:%S"),
        snapshot.operational.level,
        rigs,
        snapshot.polecats.len(),
        active,
        snapshot.mail.len(),
        snapshot.load_errors.len(),
    );
    if let Some(first) = snapshot.errors.first() {
        line.push_str(&format!(" first_error=\"{first}\""));
    }
    line
}

async fn run_once(config: &Config) -> Result<()> {
    let loader = SnapshotLoader::system(config.loader_config());
    let snapshot = loader.load(&CancellationToken::new()).await;
    let payload =
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
    println!("{payload}");
    Ok(())
}

async fn run_periodic(config: &Config) -> Result<()> {
    let store = Arc::new(Store::new(SnapshotLoader::system(config.loader_config())));
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            return;
        }
        info!("shutdown requested");
        shutdown.cancel();
    });

    let mut updates = store.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let latest = updates.borrow_and_update().clone();
            if let Some(snapshot) = latest {
                println!("{}", summary_line(&snapshot));
            }
        }
    });

    info!(root = %config.town_root.display(), "watching town");
    store.run_periodic(config.interval, &cancel).await;
    drop(store);
    if let Err(err) = printer.await {
        warn!(error = %err, "summary printer stopped");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let config = load_config(&cli)?;

    match cli.command {
        Some(command) => commands::handle_command(command, &config).await,
        None if config.once => run_once(&config).await,
        None => run_periodic(&config).await,
    }
}
