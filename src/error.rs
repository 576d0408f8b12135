//! Error taxonomy for a single sync tick.
//!
//! None of these are fatal: the loop logs them and waits for the next tick.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// No credential yet (user has not authorized)
    #[error("no spotify credential available")]
    AuthUnavailable,

    /// Transport failure or non-success status from the sensor / api
    #[error("network error: {0}")]
    Network(String),

    /// Response arrived but did not have the expected shape
    #[error("malformed response: {0}")]
    Decode(String),

    /// Spotify rejected the token (expired or revoked)
    #[error("spotify rejected the access token")]
    Unauthorized,

    /// Spotify answered with some other error status
    #[error("spotify api error {status}: {body}")]
    Api { status: u16, body: String },

    /// A configured endpoint could not be turned into a url
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Token storage could not be read or written
    #[error("token storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Storage(e.to_string())
    }
}
