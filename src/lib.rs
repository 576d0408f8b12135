//! moodsync - wearable mood to spotify playback host
//!
//! see main.rs for how the pieces are wired together.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod mood;
pub mod playlist;
pub mod sensor;
pub mod server;
pub mod spotify;
pub mod sync;
pub mod token;

pub use domain::{Credential, Mood, PlaylistMap, Reading, TickOutcome};
pub use error::SyncError;
pub use sync::MoodSync;
