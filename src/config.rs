//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: how often the loop ticks (seconds).
//!     - SensorConfig: where the wearable serves readings, or simulation.
//!     - SpotifyConfig: client id, redirect target, scopes, token file.
//!     - PlaylistMap: initial values of the three playlist fields.
//!     - ServerConfig: bind address of the dashboard.
//!     - HttpConfig: per-request timeout for outbound calls.
//!     - LoggingConfig: log level and per-tick reading output.
//!
//! ==============================================================================

use crate::domain::PlaylistMap;
use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";

/// where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// compiled defaults, with the load errors of any files that were found
    Defaults(Vec<String>),
}

impl ConfigOrigin {
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("[CONFIG] Loaded from {}", path.display()),
            ConfigOrigin::Defaults(failures) => {
                for failure in failures {
                    warn!("[CONFIG] {}", failure);
                }
                warn!("[CONFIG] No usable config file found - using defaults");
            }
        }
    }
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub playlists: PlaylistMap,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// number of ticks kept for the history table
    pub history_limit: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorMode {
    #[default]
    Http,
    Simulated,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorConfig {
    pub mode: SensorMode,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_path: PathBuf,
    pub accounts_url: String,
    pub api_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 600, history_limit: 50 }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { mode: SensorMode::Http, url: "http://127.0.0.1:5000/api/latest".to_string() }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            scopes: vec![
                "user-read-playback-state".to_string(),
                "user-modify-playback-state".to_string(),
            ],
            token_path: PathBuf::from(".spotify_token.json"),
            accounts_url: "https://accounts.spotify.com".to_string(),
            api_url: "https://api.spotify.com".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: true, bind: SocketAddr::from(([127, 0, 0, 1], 8888)) }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: HostConfig = toml::from_str(content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is set up, so what happened is returned as a
    /// ConfigOrigin for main.rs to log afterwards.
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        let mut failures = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return (config, ConfigOrigin::File(path.clone())),
                    Err(e) => failures.push(format!("{:#}", e)),
                }
            }
        }

        let mut config = Self::default();
        config.apply_env();
        (config, ConfigOrigin::Defaults(failures))
    }

    fn apply_env(&mut self) {
        self.override_client_id(std::env::var(CLIENT_ID_ENV).ok());
    }

    /// a blank override keeps the configured id
    fn override_client_id(&mut self, id: Option<String>) {
        match id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => self.spotify.client_id = id.to_string(),
            _ => {}
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_seconds == 0 {
            anyhow::bail!("polling.interval_seconds must be at least 1");
        }
        if self.sensor.mode == SensorMode::Http {
            reqwest::Url::parse(&self.sensor.url)
                .with_context(|| format!("sensor.url is not a valid url: {}", self.sensor.url))?;
        }
        reqwest::Url::parse(&self.spotify.redirect_uri).with_context(|| {
            format!("spotify.redirect_uri is not a valid url: {}", self.spotify.redirect_uri)
        })?;
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let sensor = match self.sensor.mode {
            SensorMode::Http => self.sensor.url.as_str(),
            SensorMode::Simulated => "simulated",
        };
        info!("Poll interval: {}s", self.polling.interval_seconds);
        info!("Sensor: {}", sensor);
        info!("Redirect URI: {}", self.spotify.redirect_uri);
        info!("Token file: {}", self.spotify.token_path.display());
        info!(
            "Client ID: {}",
            if self.spotify.client_id.is_empty() { "<missing>" } else { "configured" }
        );
        if self.server.enabled {
            info!("Dashboard: http://{}", self.server.bind);
        }
        info!("Log level: {}", self.logging.level);
    }
}
