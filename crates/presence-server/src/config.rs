//! Server configuration.

use std::time::Duration;

use presence_settings::ServerSettings;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Configuration for the presence relay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8080`, `0` for auto-assign).
    pub port: u16,
    /// Reaper tick interval in milliseconds.
    pub reap_interval_ms: u64,
    /// Silence after which a session is evicted, in milliseconds.
    pub stale_timeout_ms: u64,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            reap_interval_ms: 5_000,
            stale_timeout_ms: 30_000,
            send_queue_capacity: 256,
            max_message_size: 64 * 1024, // 64 KB
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reaper tick interval.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Staleness threshold.
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    /// Reject values the reaper or the per-connection queues cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        let zero = [
            ("reap_interval_ms", self.reap_interval_ms == 0),
            ("stale_timeout_ms", self.stale_timeout_ms == 0),
            ("send_queue_capacity", self.send_queue_capacity == 0),
            ("max_message_size", self.max_message_size == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ServerError::InvalidConfig(format!("{field} must be > 0"))),
            None => Ok(()),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            reap_interval_ms: s.reap_interval_ms,
            stale_timeout_ms: s.stale_timeout_ms,
            send_queue_capacity: s.send_queue_capacity,
            max_message_size: s.max_message_size,
        }
    }
}
