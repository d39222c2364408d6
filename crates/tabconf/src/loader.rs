//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, TabConfig};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tabrelay/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tabrelay/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tabrelay.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// What a single file may set. Absent keys leave the lower layer untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    listener: FileListener,
    #[serde(default)]
    relay: FileRelay,
    #[serde(default)]
    telemetry: FileTelemetry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileListener {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRelay {
    timeout_ms: Option<u64>,
    outbound_buffer: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTelemetry {
    log_level: Option<String>,
    otlp_endpoint: Option<String>,
}

/// Load a TOML file and layer it over `base`.
pub fn load_from_file(base: TabConfig, path: &Path) -> Result<TabConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(base, &contents, path)
}

fn parse_toml(base: TabConfig, contents: &str, path: &Path) -> Result<TabConfig, ConfigError> {
    let file: FileConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(overlay(base, file))
}

fn overlay(mut config: TabConfig, file: FileConfig) -> TabConfig {
    if let Some(v) = file.listener.host {
        config.listener.host = v;
    }
    if let Some(v) = file.listener.port {
        config.listener.port = v;
    }
    if let Some(v) = file.relay.timeout_ms {
        config.relay.timeout_ms = v;
    }
    if let Some(v) = file.relay.outbound_buffer {
        config.relay.outbound_buffer = v;
    }
    if let Some(v) = file.telemetry.log_level {
        config.telemetry.log_level = v;
    }
    if let Some(v) = file.telemetry.otlp_endpoint {
        config.telemetry.otlp_endpoint = v;
    }
    config
}

/// Apply environment variable overrides from the process environment.
pub fn apply_env_overrides(config: &mut TabConfig, sources: &mut ConfigSources) {
    apply_env_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using an arbitrary lookup, so tests need not touch the
/// real environment.
pub fn apply_env_overrides_from<F>(config: &mut TabConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TABRELAY_HOST") {
        config.listener.host = v;
        sources.env_overrides.push("TABRELAY_HOST".to_string());
    }
    if let Some(v) = lookup("TABRELAY_PORT") {
        if let Ok(port) = v.parse() {
            config.listener.port = port;
            sources.env_overrides.push("TABRELAY_PORT".to_string());
        }
    }

    if let Some(v) = lookup("TABRELAY_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.relay.timeout_ms = ms;
            sources.env_overrides.push("TABRELAY_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("TABRELAY_OUTBOUND_BUFFER") {
        if let Ok(depth) = v.parse() {
            config.relay.outbound_buffer = depth;
            sources.env_overrides.push("TABRELAY_OUTBOUND_BUFFER".to_string());
        }
    }

    if let Some(v) = lookup("TABRELAY_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("TABRELAY_OTLP_ENDPOINT".to_string());
    }
    // Also support standard OTEL env var
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("TABRELAY_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("TABRELAY_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}
