//! traq-presenced: standalone host for the presence engine.
//!
//! Loads the TOML config, starts the presence service on a fresh event bus
//! and logs every presence event until interrupted. Real deployments embed
//! `traq-presence` in the API server and publish connection events onto the
//! same bus; this binary is the minimal host for running the engine alone.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use traq_common::{Event, EventBus, Subscription, Topic};
use traq_config::{PresenceConfig, TraqConfig};
use traq_presence::{EngineConfig, PresenceService};

const PRESENCE_TOPICS: [Topic; 3] = [
    Topic::UserOnline,
    Topic::UserOffline,
    Topic::ChannelViewersChanged,
];

#[derive(Parser)]
#[command(name = "traq-presenced", about = "Realtime presence engine for traQ")]
struct Args {
    /// Config file path. Defaults to the platform config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive; overrides the config file, not RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between metrics dumps at debug level. 0 disables them.
    #[arg(long, default_value_t = 60)]
    metrics_interval: u64,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn engine_config(presence: &PresenceConfig) -> EngineConfig {
    EngineConfig {
        heartbeat_timeout: Duration::from_millis(u64::from(presence.heartbeat_timeout_ms)),
        heartbeat_tick: Duration::from_millis(u64::from(presence.heartbeat_tick_ms)),
        viewer_gc_interval: Duration::from_secs(u64::from(presence.viewer_gc_interval_secs)),
    }
}

fn init_tracing(args: &Args, config: &TraqConfig) {
    let fallback = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.as_directive().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

#[tokio::main]
async fn main() -> traq_common::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => traq_config::load_from_path(path)?,
        None => traq_config::load_default()?,
    };
    if args.print_config {
        println!("{}", traq_config::config_to_json(&config));
        return Ok(());
    }

    init_tracing(&args, &config);
    if let Err(e) = traq_config::validation::validate(&config) {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let bus = Arc::new(EventBus::new(config.bus.capacity as usize));
    // Subscribed before the service starts so its first events are logged too.
    let events = bus.subscribe(&PRESENCE_TOPICS);
    let service = PresenceService::start(Arc::clone(&bus), engine_config(&config.presence))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let logger = tokio::spawn(log_presence_events(events, stop_rx.clone()));
    let reporter = (args.metrics_interval > 0).then(|| {
        let metrics = service.metrics().clone();
        let period = Duration::from_secs(args.metrics_interval);
        let mut stop = stop_rx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match metrics.gather() {
                        Ok(text) => tracing::debug!(metrics = %text, "Metrics snapshot"),
                        Err(e) => tracing::warn!(error = %e, "Failed to gather metrics"),
                    },
                    _ = stop.changed() => break,
                }
            }
        })
    });

    tracing::info!(bus_capacity = config.bus.capacity, "traq-presenced running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c, shutting down");
    }
    tracing::info!("Shutting down");

    let _ = stop_tx.send(true);
    service.shutdown().await;
    let _ = logger.await;
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }
    Ok(())
}

/// Log presence events until `stop` fires or the bus closes. Returns how
/// many events were logged.
async fn log_presence_events(mut events: Subscription, mut stop: watch::Receiver<bool>) -> usize {
    let mut logged = 0;
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = stop.changed() => break,
        };
        match event {
            Some(Event::UserOnline { user_id, datetime }) => {
                tracing::info!(user_id = %user_id, at = %datetime, "User online");
            }
            Some(Event::UserOffline { user_id, datetime }) => {
                tracing::info!(user_id = %user_id, at = %datetime, "User offline");
            }
            Some(Event::ChannelViewersChanged {
                channel_id,
                viewers,
            }) => {
                tracing::debug!(channel_id = %channel_id, viewers = viewers.len(), "Channel viewers changed");
            }
            Some(_) => continue,
            None => break,
        }
        logged += 1;
    }
    logged
}
