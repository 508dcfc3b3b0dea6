//! sitepulse - send page views and custom events from the command line
//!
//! Runs a tracking session against a headless window and the configured
//! collection endpoint. Useful for checking a collector end to end.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/sitepulse/config.toml (~/.config/sitepulse/config.toml)
//! - Client id: $XDG_DATA_HOME/sitepulse/storage.json (~/.local/share/sitepulse/storage.json)
//! - Logs: $XDG_STATE_HOME/sitepulse/sitepulse.log (~/.local/state/sitepulse/sitepulse.log)

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitepulse_core::browser::{FileStorage, KeyValueStore};
use sitepulse_core::client_id::{self, STORAGE_KEY};
use sitepulse_core::{Config, Environment, HttpTransport, TrackOutcome, Tracker, TrackerConfig, Window};

#[derive(Parser)]
#[command(name = "sitepulse")]
#[command(about = "Send sitepulse page views and events from the command line")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Site identifier (overrides config)
    #[arg(long, global = true)]
    site_id: Option<String>,

    /// Collection endpoint; an empty value disables sending (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Report delivery failures and dump envelopes
    #[arg(long, global = true)]
    debug: bool,

    /// Seconds to wait for in-flight deliveries before exiting (at least 1)
    #[arg(
        long,
        global = true,
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    wait_secs: u64,

    /// Log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracker configuration and the persisted client id
    Status,

    /// Send one page view
    PageView {
        /// Page URL
        #[arg(long)]
        url: String,

        /// Document title; the path is used when empty
        #[arg(long, default_value = "")]
        title: String,

        /// Referring URL
        #[arg(long, default_value = "")]
        referrer: String,
    },

    /// Send one custom event
    Event {
        /// Event name
        name: String,

        /// URL of the page the event happened on
        #[arg(long)]
        url: String,
    },

    /// Print the persisted client id
    ClientId {
        /// Forget the persisted id instead
        #[arg(long)]
        reset: bool,
    },
}

enum Action {
    PageView,
    Event(String),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(sitepulse_core::logging::init_stderr("debug"))
    } else {
        sitepulse_core::logging::init(&config.logging).ok()
    };

    let tracker_config = apply_overrides(config.tracker, &args);
    let storage = FileStorage::new(Config::storage_path());

    match args.command {
        Command::Status => show_status(&tracker_config, &storage),
        Command::ClientId { reset } => client_id_command(&storage, reset),
        Command::PageView {
            ref url,
            ref title,
            ref referrer,
        } => {
            let window = Window::builder(url.as_str())
                .title(title.as_str())
                .referrer(referrer.as_str())
                .storage(Rc::new(storage))
                .build()
                .with_context(|| format!("invalid page url: {}", url))?;
            track(tracker_config, window, Action::PageView, args.wait_secs)
        }
        Command::Event { ref name, ref url } => {
            let window = Window::builder(url.as_str())
                .storage(Rc::new(storage))
                .build()
                .with_context(|| format!("invalid page url: {}", url))?;
            track(
                tracker_config,
                window,
                Action::Event(name.clone()),
                args.wait_secs,
            )
        }
    }
}

fn apply_overrides(mut config: TrackerConfig, args: &Args) -> TrackerConfig {
    if let Some(site_id) = &args.site_id {
        config.site_id = site_id.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    config.debug |= args.debug;
    config
}

fn show_status(config: &TrackerConfig, storage: &FileStorage) -> Result<()> {
    println!("Config:    {}", Config::config_path().display());
    println!("Storage:   {}", storage.path().display());
    println!("Log:       {}", sitepulse_core::logging::log_file_path().display());
    println!();
    println!("Site id:   {}", display_or_unset(&config.site_id));
    println!("Endpoint:  {}", display_or_unset(&config.endpoint));
    println!("Debug:     {}", config.debug);

    let missing = config.missing_fields();
    if missing.is_empty() {
        println!("Ready:     yes");
    } else {
        println!("Ready:     no (missing {})", missing.join(", "));
    }

    match storage.get(STORAGE_KEY) {
        Ok(Some(id)) => println!("Client id: {}", id),
        Ok(None) => println!("Client id: (none yet)"),
        Err(e) => println!("Client id: unavailable ({})", e),
    }
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

fn client_id_command(storage: &FileStorage, reset: bool) -> Result<()> {
    if reset {
        storage
            .remove(STORAGE_KEY)
            .context("failed to reset client id")?;
        println!("Client id reset");
        return Ok(());
    }

    let resolution = client_id::resolve(storage);
    if !resolution.is_persistent() {
        eprintln!("warning: storage unavailable, id will not persist");
    }
    println!("{}", resolution.into_id());
    Ok(())
}

fn track(config: TrackerConfig, window: Rc<Window>, action: Action, wait_secs: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let wait = Duration::from_secs(wait_secs);
    let transport = Rc::new(
        HttpTransport::with_timeout(runtime.handle().clone(), wait)
            .context("failed to create HTTP transport")?,
    );

    // One-shot session: nothing to watch, nothing to click
    let config = config
        .with_page_view_on_init(false)
        .with_spa_navigation(false)
        .with_clicks(false);
    let tracker = Tracker::start(config, Some(Environment::new(window, transport.clone())));

    let outcome = match &action {
        Action::PageView => tracker.track_page_view(),
        Action::Event(name) => tracker.track_event(name),
    };
    tracing::info!(outcome = %outcome, "tracking call finished");

    if outcome.is_dispatched() {
        let settled = runtime.block_on(tokio::time::timeout(wait, transport.wait_idle()));
        if settled.is_err() {
            eprintln!("warning: delivery still in flight after {}s", wait_secs);
        }
    }
    tracker.destroy();

    for warning in tracker.diagnostics().warnings() {
        eprintln!("warning: {}", warning);
    }

    let stats = transport.stats();
    println!("Outcome:   {}", outcome);
    println!(
        "Delivery:  {} dispatched, {} delivered, {} failed",
        stats.dispatched, stats.delivered, stats.failed
    );

    if let TrackOutcome::Rejected(misuse) = outcome {
        anyhow::bail!("tracking call rejected: {:?}", misuse);
    }
    if stats.failed > 0 {
        anyhow::bail!("{} delivery(ies) failed", stats.failed);
    }
    Ok(())
}
