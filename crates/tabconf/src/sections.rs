//! Config sections. All of these are fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the WebSocket listener for browser extensions binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Bind host.
    /// Default: 127.0.0.1
    #[serde(default = "ListenerConfig::default_host")]
    pub host: String,

    /// Bind port. The extension connects to `ws://localhost:<port>`.
    /// Default: 8080
    #[serde(default = "ListenerConfig::default_port")]
    pub port: u16,
}

impl ListenerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// Request correlation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// How long a request waits for its response before failing.
    /// Default: 10000
    #[serde(default = "RelayConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-peer outbound queue depth. A full queue fails the send for that
    /// peer instead of blocking.
    /// Default: 64
    #[serde(default = "RelayConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl RelayConfig {
    fn default_timeout_ms() -> u64 {
        10_000
    }

    fn default_outbound_buffer() -> usize {
        64
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

/// Logging and OpenTelemetry export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// EnvFilter directive (trace, debug, info, warn, error, or a full filter).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. Empty disables export.
    /// Default: empty
    #[serde(default)]
    pub otlp_endpoint: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// The OTLP endpoint if export is enabled.
    pub fn otlp(&self) -> Option<&str> {
        let endpoint = self.otlp_endpoint.trim();
        if endpoint.is_empty() {
            None
        } else {
            Some(endpoint)
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: String::new(),
        }
    }
}
