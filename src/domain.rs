//! ==============================================================================
//! domain.rs - shared data model
//! ==============================================================================
//!
//! purpose:
//!     the handful of types every other module passes around: a sensor
//!     reading, the mood label, the per-mood playlist map, the bearer
//!     credential and the tick history records shown on the dashboard.
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// one sample from the wearable
///
/// extra fields in the sensor payload (device_id, humidity, gyro_*) are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// body/skin temperature in celsius
    pub temperature: f64,
    /// acceleration magnitude in g
    pub acceleration: f64,
}

/// coarse mood label derived from a reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Relaxed,
    Neutral,
    Energetic,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Relaxed, Mood::Neutral, Mood::Energetic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Relaxed => "relaxed",
            Mood::Neutral => "neutral",
            Mood::Energetic => "energetic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// playlist context uri per mood
///
/// values are opaque; an empty string is a valid (if useless) entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMap {
    #[serde(default)]
    pub relaxed: String,
    #[serde(default)]
    pub neutral: String,
    #[serde(default)]
    pub energetic: String,
}

impl PlaylistMap {
    pub fn get(&self, mood: Mood) -> &str {
        match mood {
            Mood::Relaxed => &self.relaxed,
            Mood::Neutral => &self.neutral,
            Mood::Energetic => &self.energetic,
        }
    }

    pub fn set(&mut self, mood: Mood, value: String) {
        match mood {
            Mood::Relaxed => self.relaxed = value,
            Mood::Neutral => self.neutral = value,
            Mood::Energetic => self.energetic = value,
        }
    }
}

/// bearer token for the spotify web api
///
/// expiry is managed by spotify; we only learn about it through a 401.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// what a single tick ended with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "mood", rename_all = "snake_case")]
pub enum TickOutcome {
    /// no token yet, or the tick caused a navigation
    NoCredential,
    /// sensor unreachable or returned garbage
    SensorFailed,
    /// same mood as last time, nothing dispatched
    Unchanged(Mood),
    /// mood changed and a dispatch was attempted
    Dispatched(Mood),
}

/// whether a dispatch actually got music playing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
    Played,
    NoDevice,
    Failed,
}

impl Playback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Playback::Played => "played",
            Playback::NoDevice => "no device",
            Playback::Failed => "failed",
        }
    }
}

/// history entry for the dashboard table
#[derive(Clone, Debug, Serialize)]
pub struct TickRecord {
    /// unix timestamp in milliseconds
    pub at_ms: u64,
    pub reading: Reading,
    pub mood: Mood,
    pub outcome: TickOutcome,
    /// set only when the tick dispatched
    pub playback: Option<Playback>,
}

/// current view of the loop, shared with the web server
#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncSnapshot {
    pub last_mood: Option<Mood>,
    pub last_reading: Option<Reading>,
    pub authorized: bool,
    /// unix timestamp (ms) of the last finished tick
    pub updated_ms: u64,
    /// newest first, bounded by the history limit
    pub ticks: Vec<TickRecord>,
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
