//! Posture Relay Server
//!
//! Run with: cargo run -- [--config config.toml]
//!
//! # Configuration
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! config file (`--config`, or the first of
//! `~/.config/posture-relay/config.toml`, `/etc/posture-relay/config.toml`,
//! `./config.toml`), `POSTURE_RELAY_*` environment variables, and command
//! line flags. `RUST_LOG` overrides the configured log level.

use clap::{Parser, Subcommand};
use posture_relay::api::{self, AppState};
use posture_relay::config::{generate_default_config, Config, LoggingConfig};
use posture_relay::upstream::{MqttBroker, UpstreamSubscriber};
use posture_relay::websocket::{BroadcastRelay, ClientRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "posture-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relays posture telemetry from MQTT to live WebSocket dashboards")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// MQTT broker host
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    broker_port: Option<u16>,

    /// Topic to relay
    #[arg(short, long)]
    topic: Option<String>,

    /// Directory with the dashboard files
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a default config file
    Config,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.broker_host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.broker_port {
            config.broker.port = port;
        }
        if let Some(topic) = &self.topic {
            config.broker.topic = topic.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Config)) {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let source = cli.config.clone().or_else(Config::discover);
    let mut config = match &source {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };
    cli.apply(&mut config);

    init_tracing(&config.logging);

    tracing::info!("Starting posture relay v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let topic = config.topic()?;

    // Bind before connecting upstream so a busy port fails fast
    let listener = api::bind(&config.server).await?;

    let registry = Arc::new(ClientRegistry::new());
    let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));

    let subscriber = UpstreamSubscriber::new(
        MqttBroker::new(&config.broker),
        topic.clone(),
        config.reconnect.clone(),
        relay,
    );
    let state = AppState::new(registry, subscriber.link_state(), topic)
        .with_static_dir(config.server.static_dir.clone());

    if let Some(dir) = &state.static_dir {
        tracing::info!("Serving dashboard from {:?}", dir);
    }

    let upstream = subscriber.spawn();

    api::serve_on(listener, state).await?;

    upstream.abort();
    tracing::info!("Posture relay stopped");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "posture_relay={},tower_http=info",
            logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
