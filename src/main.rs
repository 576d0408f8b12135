//! ==============================================================================
//! main.rs - moodsync host entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the sync loop and the dashboard together and runs them until
//!     the process is stopped.
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                      moodsync host                        │
//!     │  ┌──────────────────┐  snapshot  ┌─────────────────────┐ │
//!     │  │ sync loop        │ ─────────> │ web server          │ │
//!     │  │ (interval tick)  │ <───────── │ (dashboard/callback)│ │
//!     │  └────┬────────┬────┘  playlists └─────────────────────┘ │
//!     │       │        │       + browser location                │
//!     └───────┼────────┼─────────────────────────────────────────┘
//!             ▼        ▼
//!        wearable    spotify web api
//!        (GET json)  (devices, play)
//!
//! ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use moodsync::config::{ConfigOrigin, HostConfig, SensorMode};
use moodsync::dispatch::PlaybackDispatcher;
use moodsync::playlist::{PlaylistFields, PlaylistResolver};
use moodsync::sensor::{HttpSensor, SensorClient, SimulatedSensor};
use moodsync::server::{self, WebState};
use moodsync::spotify::SpotifyApi;
use moodsync::sync::{MoodSync, SharedSnapshot};
use moodsync::token::{AuthorizeParams, BrowserRelay, FileTokenStorage, TokenStore};

#[derive(Parser, Debug)]
#[command(name = "moodsync", version, about = "Play the Spotify playlist that matches your mood")]
struct Args {
    /// Path to host.toml (default: config/host.toml, then ../config/host.toml)
    #[arg(short, long, env = "MOODSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Do not start the dashboard
    #[arg(long)]
    no_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // step 1: load configuration (an explicit --config must be valid)
    let (config, origin) = match &args.config {
        Some(path) => (HostConfig::load(path)?, ConfigOrigin::File(path.clone())),
        None => HostConfig::load_or_default(),
    };

    // step 2: logging, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting moodsync v{}", env!("CARGO_PKG_VERSION"));
    origin.log();
    config.print_summary();

    // step 3: shared state between the loop and the dashboard
    let redirect_uri = reqwest::Url::parse(&config.spotify.redirect_uri)
        .context("spotify.redirect_uri is not a valid url")?;
    let params = AuthorizeParams {
        client_id: config.spotify.client_id.clone(),
        redirect_uri,
        scopes: config.spotify.scopes.clone(),
        accounts_url: config.spotify.accounts_url.clone(),
    };
    let relay = Arc::new(BrowserRelay::new(params.app_root()));
    let playlists = Arc::new(PlaylistFields::new(config.playlists.clone()));
    let snapshot = SharedSnapshot::default();

    // step 4: components
    let timeout = Duration::from_secs(config.http.timeout_seconds);
    let storage = Arc::new(FileTokenStorage::new(&config.spotify.token_path));
    let tokens = TokenStore::new(storage, relay.clone(), params);
    let sensor: Arc<dyn SensorClient> = match config.sensor.mode {
        SensorMode::Http => Arc::new(HttpSensor::new(&config.sensor.url, timeout)?),
        SensorMode::Simulated => {
            info!("Using SIMULATED sensor (no wearable access)");
            Arc::new(SimulatedSensor)
        }
    };
    let spotify = Arc::new(SpotifyApi::new(&config.spotify.api_url, timeout)?);

    let mut sync = MoodSync::new(
        tokens,
        sensor,
        PlaylistResolver::new(playlists.clone()),
        PlaybackDispatcher::new(spotify),
    )
    .with_snapshot(snapshot.clone(), config.polling.history_limit)
    .show_sensor_data(config.logging.show_sensor_data);

    if args.once {
        let outcome = sync.tick().await;
        info!("Single tick finished: {:?}", outcome);
        return Ok(());
    }

    // step 5: dashboard in background
    if config.server.enabled && !args.no_server {
        let web = WebState { snapshot, playlists, relay };
        let bind = config.server.bind;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(web, bind).await {
                error!("Web server error: {:#}", e);
            }
        });
    }

    // step 6: the loop runs until ctrl-c
    let period = Duration::from_secs(config.polling.interval_seconds);
    info!("Starting mood sync ({}s interval)", config.polling.interval_seconds);
    tokio::select! {
        _ = sync.run(period) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
