//! ==============================================================================
//! sync.rs - the mood -> playback synchronization loop
//! ==============================================================================
//!
//! purpose:
//! one tick = acquire token -> read sensor -> classify -> compare with the
//! last mood -> dispatch only on change -> remember the mood.
//!
//! Idle -> Acquiring -> Sensing -> Classifying -> (Unchanged | Dispatching) -> Idle
//!
//! rules:
//! - no credential / sensor failure end the tick quietly; nothing is
//!   retried before the next tick.
//! - last_mood starts empty, so the first classified mood always dispatches.
//! - last_mood is set after dispatch returns, whatever dispatch reported.
//!   a failed playback is not retried until the mood changes again.
//! - ticks run one after another on a single task. a tick that outlives
//!   the interval makes the loop skip the missed fires, never overlap them.
//!
//! relationships:
//! - uses: token.rs, sensor.rs, mood.rs, playlist.rs, dispatch.rs
//! - publishes: SyncSnapshot for server.rs
//!
//! ==============================================================================

use crate::dispatch::{DispatchReport, PlaybackDispatcher};
use crate::domain::{now_ms, Mood, Reading, SyncSnapshot, TickOutcome, TickRecord};
use crate::error::SyncError;
use crate::mood;
use crate::playlist::PlaylistResolver;
use crate::sensor::SensorClient;
use crate::token::TokenStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// snapshot shared with the web server
pub type SharedSnapshot = Arc<RwLock<SyncSnapshot>>;

/// the only mutable state of the loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    pub last_mood: Option<Mood>,
}

pub struct MoodSync {
    tokens: TokenStore,
    sensor: Arc<dyn SensorClient>,
    playlists: PlaylistResolver,
    dispatcher: PlaybackDispatcher,
    state: SyncState,
    snapshot: SharedSnapshot,
    history_limit: usize,
    show_sensor_data: bool,
}

impl MoodSync {
    pub fn new(
        tokens: TokenStore,
        sensor: Arc<dyn SensorClient>,
        playlists: PlaylistResolver,
        dispatcher: PlaybackDispatcher,
    ) -> Self {
        Self {
            tokens,
            sensor,
            playlists,
            dispatcher,
            state: SyncState::default(),
            snapshot: SharedSnapshot::default(),
            history_limit: 50,
            show_sensor_data: false,
        }
    }

    /// publish into an existing snapshot, keeping at most `limit` ticks
    pub fn with_snapshot(mut self, snapshot: SharedSnapshot, limit: usize) -> Self {
        self.snapshot = snapshot;
        self.history_limit = limit;
        self
    }

    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// run one full cycle; never fails
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(credential) = self.tokens.acquire() else {
            debug!("Skipping tick: {}", SyncError::AuthUnavailable);
            self.publish(None).await;
            return TickOutcome::NoCredential;
        };

        let reading = match self.sensor.fetch_reading().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("[SENSOR] ⚠ Read error: {}", e);
                self.publish(None).await;
                return TickOutcome::SensorFailed;
            }
        };

        let mood = mood::classify(&reading);
        self.log_reading(&reading, mood);

        let (outcome, playback) = if self.state.last_mood == Some(mood) {
            info!("Mood unchanged ({}), nothing to play", mood);
            (TickOutcome::Unchanged(mood), None)
        } else {
            match self.state.last_mood {
                Some(previous) => info!("Mood changed: {} -> {}", previous, mood),
                None => info!("Initial mood: {}", mood),
            }
            let playlists = self.playlists.resolve();
            let report = self.dispatcher.dispatch(mood, &credential, &playlists).await;
            if report == (DispatchReport::Failed { unauthorized: true }) {
                self.tokens.forget();
            }
            self.state.last_mood = Some(mood);
            (TickOutcome::Dispatched(mood), Some(report.playback()))
        };

        let record = TickRecord { at_ms: now_ms(), reading, mood, outcome, playback };
        self.publish(Some(record)).await;
        outcome
    }

    /// tick immediately, then every `period`, forever
    pub async fn run(mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let outcome = self.tick().await;
            debug!("Tick finished: {:?}", outcome);
        }
    }

    fn log_reading(&self, reading: &Reading, mood: Mood) {
        let score = mood::score(reading);
        if self.show_sensor_data {
            info!(
                "[SENSOR] Temp: {:.1}°C | Accel: {:.2}g | Score: {:.1} -> {}",
                reading.temperature, reading.acceleration, score, mood
            );
        } else {
            debug!(temperature = reading.temperature, acceleration = reading.acceleration, score, %mood, "reading");
        }
    }

    async fn publish(&self, record: Option<TickRecord>) {
        let authorized = self.tokens.has_token();
        let mut snapshot = self.snapshot.write().await;
        snapshot.authorized = authorized;
        snapshot.last_mood = self.state.last_mood;
        snapshot.updated_ms = now_ms();
        if let Some(record) = record {
            snapshot.last_reading = Some(record.reading);
            snapshot.ticks.insert(0, record);
            snapshot.ticks.truncate(self.history_limit);
        }
    }
}
