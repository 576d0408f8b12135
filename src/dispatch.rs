//! ==============================================================================
//! dispatch.rs - best-effort playback trigger
//! ==============================================================================
//!
//! purpose:
//! device lookup -> first device -> start the mood's playlist on it.
//!
//! nothing in here returns an error. a missed playback trigger is
//! acceptable, a crashed loop is not. the caller gets a DispatchReport
//! so it can log and notice a rejected token.
//!
//! ==============================================================================

use crate::domain::{Credential, Mood, Playback, PlaylistMap};
use crate::error::SyncError;
use crate::spotify::MusicService;

use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchReport {
    Started { device_id: String },
    /// not an error: nothing to play on
    NoActiveDevice,
    Failed { unauthorized: bool },
}

impl DispatchReport {
    pub fn playback(&self) -> Playback {
        match self {
            DispatchReport::Started { .. } => Playback::Played,
            DispatchReport::NoActiveDevice => Playback::NoDevice,
            DispatchReport::Failed { .. } => Playback::Failed,
        }
    }
}

pub struct PlaybackDispatcher {
    service: Arc<dyn MusicService>,
}

impl PlaybackDispatcher {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }

    pub async fn dispatch(
        &self,
        mood: Mood,
        credential: &Credential,
        playlists: &PlaylistMap,
    ) -> DispatchReport {
        let devices = match self.service.devices(credential).await {
            Ok(devices) => devices,
            Err(e) => return failed("device lookup", e),
        };

        let Some(device) = devices.first() else {
            info!("No active Spotify device found - open Spotify on a device");
            return DispatchReport::NoActiveDevice;
        };

        let context_uri = playlists.get(mood);
        if context_uri.is_empty() {
            warn!("No playlist configured for mood '{}'", mood);
        }

        match self.service.start_playback(credential, &device.id, context_uri).await {
            Ok(()) => {
                info!("🎵 Playing '{}' playlist on {}", mood, display_name(&device.name, &device.id));
                DispatchReport::Started { device_id: device.id.clone() }
            }
            Err(e) => failed("start playback", e),
        }
    }
}

fn failed(step: &str, e: SyncError) -> DispatchReport {
    let unauthorized = matches!(e, SyncError::Unauthorized);
    if unauthorized {
        warn!("Spotify {} rejected: {}", step, e);
    } else {
        error!("Spotify {} failed: {}", step, e);
    }
    DispatchReport::Failed { unauthorized }
}

fn display_name<'a>(name: &'a str, id: &'a str) -> &'a str {
    if name.is_empty() {
        id
    } else {
        name
    }
}
