//! src/config.rs
//!
//! Defines the strongly-typed `Config` struct for the protocol tunables,
//! loaded from files and environment variables via `figment`. Defaults are
//! the normative protocol constants; tests override the periods to compress
//! time.

use crate::domain;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol tunables shared by every service of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub probe_period_ms: u64,
    pub gossip_period_ms: u64,
    pub grace_period_ms: u64,
    pub status_period_ms: u64,
    pub fan_out: usize,
    pub capacity: usize,
    pub bind_retries: u32,
    pub bind_retry_delay_ms: u64,
}

impl Config {
    /// Loads configuration from `swim.toml` and environment variables.
    /// It uses the `Default` implementation as a base layer.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("swim.toml"))
            .merge(Env::prefixed("SWIM_"))
            .extract()
    }

    pub fn probe_period(&self) -> Duration {
        Duration::from_millis(self.probe_period_ms)
    }

    pub fn gossip_period(&self) -> Duration {
        Duration::from_millis(self.gossip_period_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn status_period(&self) -> Duration {
        Duration::from_millis(self.status_period_ms)
    }

    pub fn bind_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bind_retry_delay_ms)
    }

    /// How long a pending indirect-probe request stays answerable: the
    /// remainder of the requestor's probe cycle after its direct phase.
    pub fn indirect_deadline(&self) -> Duration {
        self.probe_period() * 3 / 4
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_period_ms: domain::PROBE_PERIOD_MS,
            gossip_period_ms: domain::GOSSIP_PERIOD_MS,
            grace_period_ms: domain::GRACE_PERIOD_MS,
            status_period_ms: domain::STATUS_PERIOD_MS,
            fan_out: domain::FAN_OUT,
            capacity: domain::CAPACITY,
            bind_retries: domain::BIND_RETRIES,
            bind_retry_delay_ms: domain::BIND_RETRY_DELAY_MS,
        }
    }
}
