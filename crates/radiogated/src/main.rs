//! Radiogate Daemon - turns Wi-Fi off while a wired link is up, back on when it drops

use anyhow::{Context, Result};
use clap::Parser;
use radiogate_common::{Config, LinkArbiter};
use radiogated::{
    logging, probe, signals, DesktopNotifier, Journal, Notifier, NullNotifier, PollLoop, Sampler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "radiogated")]
#[command(about = "Radiogate - wired-first Wi-Fi arbitration daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: /etc/radiogate/config.toml, then the user config dir)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log radio changes instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// Run a single tick, print what was seen and decided, then exit
    #[arg(long)]
    once: bool,

    /// Print the default config file and exit
    #[arg(long)]
    print_config: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<(Config, Option<PathBuf>)> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Config::locate(),
    };
    let config = match &path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    Ok((config, path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::default_toml());
        return Ok(());
    }

    let (config, path) = load_config(&cli)?;
    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    info!("Radiogate Daemon v{} starting", env!("CARGO_PKG_VERSION"));
    match &path {
        Some(path) => info!("Config loaded from {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    let backends = probe::connect(&config, cli.dry_run).await;
    let sampler = Sampler::new(backends.probe.clone(), config.candidate_policy());

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled && !cli.once {
        Arc::new(DesktopNotifier::new(config.platform, &config.notifications))
    } else {
        Arc::new(NullNotifier)
    };
    let journal = if cli.once {
        Journal::disabled()
    } else {
        Journal::new(config.logging.journal_path.clone())
    };

    let mut poll_loop = PollLoop::new(
        LinkArbiter::new(config.to_arbiter_config()),
        sampler,
        backends.actuator,
        notifier,
        journal,
    );

    if cli.once {
        let outcome = poll_loop.tick().await;
        println!("{}", outcome);
        return Ok(());
    }

    let shutdown = signals::shutdown_channel();
    poll_loop.run(shutdown).await;

    info!("Shutting down gracefully");
    Ok(())
}
