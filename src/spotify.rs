//! ==============================================================================
//! spotify.rs - the two spotify web api calls we need
//! ==============================================================================
//!
//! purpose:
//! - GET  /v1/me/player/devices          -> list of playback devices
//! - PUT  /v1/me/player/play?device_id=  -> start a playlist context
//!
//! both authenticated with `Authorization: Bearer <token>`.
//! a 401 maps to SyncError::Unauthorized so the loop can drop the token.
//!
//! relationships:
//! - used by: dispatch.rs (through the MusicService trait)
//!
//! ==============================================================================

use crate::domain::Credential;
use crate::error::{Result, SyncError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Serialize)]
struct PlayRequest<'a> {
    context_uri: &'a str,
}

#[async_trait]
pub trait MusicService: Send + Sync {
    async fn devices(&self, credential: &Credential) -> Result<Vec<Device>>;
    async fn start_playback(
        &self,
        credential: &Credential,
        device_id: &str,
        context_uri: &str,
    ) -> Result<()>;
}

pub struct SpotifyApi {
    client: reqwest::Client,
    base: String,
}

impl SpotifyApi {
    /// `base` is normally https://api.spotify.com
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self { client, base: base.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url> {
        let raw = format!("{}{}", self.base, path);
        reqwest::Url::parse(&raw).map_err(|e| SyncError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

/// turn a non-success response into the matching error
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(SyncError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Api { status: status.as_u16(), body })
}

#[async_trait]
impl MusicService for SpotifyApi {
    async fn devices(&self, credential: &Credential) -> Result<Vec<Device>> {
        let url = self.endpoint("/v1/me/player/devices")?;
        debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(credential.token()).send().await?;
        let list: DeviceList = check(response).await?.json().await?;
        Ok(list.devices)
    }

    async fn start_playback(
        &self,
        credential: &Credential,
        device_id: &str,
        context_uri: &str,
    ) -> Result<()> {
        let mut url = self.endpoint("/v1/me/player/play")?;
        url.query_pairs_mut().append_pair("device_id", device_id);
        debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .bearer_auth(credential.token())
            .json(&PlayRequest { context_uri })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
