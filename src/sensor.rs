//! ==============================================================================
//! sensor.rs - wearable reading provider
//! ==============================================================================
//!
//! purpose:
//! one reading per call, no retries. the loop decides what a failure
//! means (it waits for the next tick).
//!
//! - HttpSensor: `GET <sensor.url>` returning
//!   `{"temperature": f64, "acceleration": f64, ...}`
//! - SimulatedSensor: random but plausible values, for running the
//!   host on a desk without the wearable.
//!
//! ==============================================================================

use crate::domain::Reading;
use crate::error::{Result, SyncError};

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait SensorClient: Send + Sync {
    async fn fetch_reading(&self) -> Result<Reading>;
}

// ==============================================================================
// http sensor
// ==============================================================================

pub struct HttpSensor {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpSensor {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SensorClient for HttpSensor {
    async fn fetch_reading(&self) -> Result<Reading> {
        debug!("GET {}", self.url);
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!("sensor returned {}", status)));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<Reading>(&body).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

// ==============================================================================
// simulated sensor
// ==============================================================================

/// body temperature 36.0-38.0 °C, acceleration 0.0-1.5 g
#[derive(Default)]
pub struct SimulatedSensor;

#[async_trait]
impl SensorClient for SimulatedSensor {
    async fn fetch_reading(&self) -> Result<Reading> {
        let mut rng = rand::thread_rng();
        let temperature: f64 = rng.gen_range(36.0..=38.0);
        let acceleration: f64 = rng.gen_range(0.0..=1.5);
        Ok(Reading {
            temperature: (temperature * 100.0).round() / 100.0,
            acceleration: (acceleration * 100.0).round() / 100.0,
        })
    }
}
