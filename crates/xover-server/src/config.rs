//! Server settings read from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use xover_core::{SESSION_TTL, SWEEP_INTERVAL};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on (`SERVER_ADDR`)
    pub addr: SocketAddr,
    /// Lifetime of a negotiation record (`SESSION_TTL_SECS`)
    pub session_ttl: Duration,
    /// Period of the expiry sweep (`SWEEP_INTERVAL_SECS`)
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            session_ttl: SESSION_TTL,
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let session_ttl = match lookup("SESSION_TTL_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse().context("SESSION_TTL_SECS is not a number")?,
            ),
            None => defaults.session_ttl,
        };

        let sweep_interval = match lookup("SWEEP_INTERVAL_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse().context("SWEEP_INTERVAL_SECS is not a number")?,
            ),
            None => defaults.sweep_interval,
        };
        anyhow::ensure!(!sweep_interval.is_zero(), "SWEEP_INTERVAL_SECS must be positive");

        Ok(Self {
            addr,
            session_ttl,
            sweep_interval,
        })
    }
}
