use std::collections::HashMap;

use serde::Deserialize;
use rpcgate_core::error::{GateError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    /// consumer -> ordered method patterns
    #[serde(default)]
    pub acl: HashMap<String, Vec<String>>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GateError::UnsupportedVersion);
        }
        if self.acl.keys().any(|c| c.is_empty()) {
            return Err(GateError::BadRequest("acl consumer must not be empty".into()));
        }

        self.server.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Capacity of the broadcaster intake queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Capacity of each subscriber's queue.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    #[serde(default = "default_max_stats_interval_secs")]
    pub max_stats_interval_secs: u64,

    /// 0 stops immediately on shutdown, aborting in-flight calls.
    #[serde(default)]
    pub drain_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            event_buffer: default_event_buffer(),
            subscriber_buffer: default_subscriber_buffer(),
            max_stats_interval_secs: default_max_stats_interval_secs(),
            drain_timeout_ms: 0,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(GateError::BadRequest(format!(
                "server.listen must be a valid SocketAddr: {}",
                self.listen
            )));
        }
        if !(1..=65536).contains(&self.event_buffer) {
            return Err(GateError::BadRequest(
                "server.event_buffer must be between 1 and 65536".into(),
            ));
        }
        if !(1..=65536).contains(&self.subscriber_buffer) {
            return Err(GateError::BadRequest(
                "server.subscriber_buffer must be between 1 and 65536".into(),
            ));
        }
        if !(1..=86400).contains(&self.max_stats_interval_secs) {
            return Err(GateError::BadRequest(
                "server.max_stats_interval_secs must be between 1 and 86400".into(),
            ));
        }
        if self.drain_timeout_ms > 60000 {
            return Err(GateError::BadRequest(
                "server.drain_timeout_ms must not exceed 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8082".into()
}
fn default_event_buffer() -> usize {
    1024
}
fn default_subscriber_buffer() -> usize {
    256
}
fn default_max_stats_interval_secs() -> u64 {
    3600
}
