//! Configuration loading for tabrelay.
//!
//! Every value here is fixed at startup: the WebSocket bind address the
//! browser extension dials, the correlation timeout, and where logs and
//! traces go.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tabconf::TabConfig;
//!
//! let config = TabConfig::load().expect("Failed to load config");
//! println!("extensions connect to ws://{}", config.listener.bind_addr());
//! println!("timeout: {:?}", config.relay.timeout());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tabrelay/config.toml` (system)
//! 2. `~/.config/tabrelay/config.toml` (user)
//! 3. `./tabrelay.toml` or `--config <path>` (local override)
//! 4. Environment variables (`TABRELAY_*`, `RUST_LOG`, `OTEL_EXPORTER_OTLP_ENDPOINT`)
//!
//! # Example Config
//!
//! ```toml
//! [listener]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [relay]
//! timeout_ms = 10000
//! outbound_buffer = 64
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = ""
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ListenerConfig, RelayConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete tabrelay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TabConfig {
    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl TabConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/tabrelay/config.toml`
    /// 3. `~/.config/tabrelay/config.toml`
    /// 4. `./tabrelay.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit override file, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./tabrelay.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = TabConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            config = loader::load_from_file(config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# tabrelay configuration\n\n");

        output.push_str("[listener]\n");
        output.push_str(&format!("host = \"{}\"\n", self.listener.host));
        output.push_str(&format!("port = {}\n", self.listener.port));

        output.push_str("\n[relay]\n");
        output.push_str(&format!("timeout_ms = {}\n", self.relay.timeout_ms));
        output.push_str(&format!(
            "outbound_buffer = {}\n",
            self.relay.outbound_buffer
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.telemetry.otlp_endpoint
        ));

        output
    }
}
