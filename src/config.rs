//! Server configuration module.
//!
//! Handles loading, validating, and merging the server's `config.toml`.
//! Stock defaults are the base layer; a user config file, when given with
//! `--config`, is merged on top key by key.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! host = "0.0.0.0"          # Interface to listen on
//! port = 8080               # TCP port
//!
//! [limits]
//! max_body_bytes = 102400   # Larger request bodies are rejected with 400
//!
//! [imaging]
//! output_format = "png"     # Lossless response encoding: png, bmp, tiff
//! crop_clamp = "legacy"     # Right/bottom edge clamping: legacy, strict
//!
//! [processing]
//! max_threads = 4           # Filter worker threads (omit for auto = CPU cores)
//!
//! [monitor]
//! enabled = true            # Poll the server to estimate load
//! max_wait_ms = 500         # Probe timeout; average above this = high load
//! poll_interval_ms = 500    # Delay between probes
//! window = 10               # Probes averaged before the window restarts
//!
//! [logging]
//! filter = "info"           # tracing filter, RUST_LOG takes precedence
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! # Only change the port
//! [server]
//! port = 9000
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CropClamp, LosslessFormat};
use crate::request::MAX_CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listening address.
    pub server: ListenConfig,
    /// Request size limits.
    pub limits: LimitsConfig,
    /// Response encoding and crop behavior.
    pub imaging: ImagingConfig,
    /// Filter parallelism.
    pub processing: ProcessingConfig,
    /// Background load monitor.
    pub monitor: MonitorConfig,
    /// Log filtering.
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".into(),
            ));
        }
        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_body_bytes must be non-zero".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        if self.monitor.window == 0 {
            return Err(ConfigError::Validation(
                "monitor.window must be non-zero".into(),
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "monitor.poll_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Listening address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted request body. Checked against both the declared
    /// `Content-Length` and the bytes actually received.
    pub max_body_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: MAX_CONTENT_LENGTH,
        }
    }
}

/// Response encoding and crop behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagingConfig {
    pub output_format: LosslessFormat,
    pub crop_clamp: CropClamp,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of filter worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Background load monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// Probe timeout. An average probe time above this means high load.
    pub max_wait_ms: u64,
    /// Delay between probes.
    pub poll_interval_ms: u64,
    /// Number of probes averaged before the window restarts.
    pub window: u32,
}

impl MonitorConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait_ms: 500,
            poll_interval_ms: 500,
            window: 10,
        }
    }
}

/// Log filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ServerConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the server config.
///
/// With no path, the stock defaults are used. With a path, the file must
/// exist; its values are merged on top of the defaults, unknown keys are
/// rejected, and the result is validated.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Transformer Configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with: image-transformer --config config.toml serve
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Listening address
# ---------------------------------------------------------------------------
[server]
host = "0.0.0.0"
port = 8080

# ---------------------------------------------------------------------------
# Request limits
# ---------------------------------------------------------------------------
[limits]
# Larger request bodies are rejected with 400 Bad Request.
max_body_bytes = 102400

# ---------------------------------------------------------------------------
# Imaging
# ---------------------------------------------------------------------------
[imaging]
# Lossless encoding of processed images: "png", "bmp" or "tiff".
output_format = "png"

# Right/bottom edge clamping of the crop rectangle.
#   "legacy" - compare x + width against (image width - x); may widen a
#              rectangle that already fits
#   "strict" - compare x + width against the image width; only shrinks
crop_clamp = "legacy"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum filter worker threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4

# ---------------------------------------------------------------------------
# Load monitor
# ---------------------------------------------------------------------------
[monitor]
# Periodically probe the server and keep a rolling average response time.
enabled = true
# Probe timeout in milliseconds. An average above this reports high load.
max_wait_ms = 500
# Delay between probes in milliseconds.
poll_interval_ms = 500
# Probes averaged before the window restarts from the current average.
window = 10

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directives, e.g. "debug" or "image_transformer=trace".
# The RUST_LOG environment variable takes precedence.
filter = "info"
"##
}
