//! Client settings.

use crate::error::ClientError;
use anyhow::Context;
use std::time::Duration;
use xover_core::controller::NOTICE_DURATION;
use xover_core::SESSION_TTL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket URL of the rendezvous server (`XOVER_SERVER_URL`)
    pub server_url: String,
    /// Delay between record fetches while negotiating (`XOVER_POLL_MS`)
    pub poll_interval: Duration,
    /// Give up if not connected by then; `None` polls until torn down
    /// (`XOVER_NEGOTIATION_TIMEOUT_SECS`, 0 disables)
    pub negotiation_timeout: Option<Duration>,
    /// How long transient notices stay visible
    pub notice_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            poll_interval: Duration::from_secs(1),
            negotiation_timeout: Some(SESSION_TTL),
            notice_duration: NOTICE_DURATION,
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Reject settings the match loop cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.poll_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("XOVER_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(ms) = lookup("XOVER_POLL_MS") {
            let ms: u64 = ms.parse().context("XOVER_POLL_MS is not a number")?;
            anyhow::ensure!(ms > 0, "XOVER_POLL_MS must be positive");
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup("XOVER_NEGOTIATION_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("XOVER_NEGOTIATION_TIMEOUT_SECS is not a number")?;
            config.negotiation_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}
