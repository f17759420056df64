//! Client configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config.
//!
//! ```toml
//! relay_url = "ws://watch.example.com:5000/ws"
//! api_base_url = "http://watch.example.com:5000"
//! drift_interval_ms = 5000
//! drift_threshold_secs = 1.0
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer};

use crate::application::drift::{DEFAULT_DRIFT_INTERVAL, DEFAULT_DRIFT_THRESHOLD};
use crate::error::SyncError;

const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:5000/ws";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_SUPPRESSION_TTL: Duration = Duration::from_secs(3);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// WebSocket URL of the event relay.
    pub relay_url: String,
    /// Base URL of the room REST service.
    pub api_base_url: String,
    /// Period of the host's drift check.
    #[serde(rename = "drift_interval_ms", deserialize_with = "millis")]
    pub drift_interval: Duration,
    /// Seconds of divergence that trigger a corrective seek.
    pub drift_threshold_secs: f64,
    /// How long an unconsumed echo-suppression latch stays armed.
    #[serde(rename = "suppression_ttl_ms", deserialize_with = "millis")]
    pub suppression_ttl: Duration,
    /// Timeout for room service requests.
    #[serde(rename = "request_timeout_ms", deserialize_with = "millis")]
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            drift_interval: DEFAULT_DRIFT_INTERVAL,
            drift_threshold_secs: DEFAULT_DRIFT_THRESHOLD,
            suppression_ttl: DEFAULT_SUPPRESSION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("parsing sync config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.drift_interval.is_zero() {
            return Err(SyncError::Config("drift_interval_ms must be positive".into()));
        }
        if !self.drift_threshold_secs.is_finite() || self.drift_threshold_secs < 0.0 {
            return Err(SyncError::Config(format!(
                "drift_threshold_secs must be a non-negative number, got {}",
                self.drift_threshold_secs
            )));
        }
        if self.relay_url.is_empty() {
            return Err(SyncError::Config("relay_url is empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_drift_interval(mut self, interval: Duration) -> Self {
        self.drift_interval = interval;
        self
    }

    #[must_use]
    pub fn with_drift_threshold(mut self, seconds: f64) -> Self {
        self.drift_threshold_secs = seconds;
        self
    }

    #[must_use]
    pub fn with_suppression_ttl(mut self, ttl: Duration) -> Self {
        self.suppression_ttl = ttl;
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
