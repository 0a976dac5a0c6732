//! Configuration loading for chat-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`). Every
//! section and field is optional; missing values fall back to the defaults
//! below.

use chat_core::AdmissionPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for chat-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Admission and rate limiting configuration.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener (default: 0.0.0.0:3000).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Maximum concurrent connections (default: 10,000).
    /// Upgrades beyond this are refused with 503.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Broadcast channel capacity (default: 256).
    /// A connection that falls this many frames behind skips the missed frames.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Hard WebSocket frame ceiling in bytes (default: 16MB).
    /// Frames above this are refused by the transport and close the
    /// connection. This is the only rejection that ends a connection; every
    /// other limit answers with a notice and keeps it open. Must be at least
    /// `limits.max_image_bytes` so that the size gate, not the transport,
    /// handles ordinary oversize messages.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Admission and rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Messages a connection may send per window (default: 30).
    #[serde(default = "default_messages_per_window")]
    pub messages_per_window: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum plain payload size in bytes (default: 10KB).
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
    /// Maximum size in bytes for payloads carrying image data (default: 5MB).
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Messages per second across all connections (default: 1000).
    #[serde(default = "default_global_messages_per_second")]
    pub global_messages_per_second: u32,
    /// How often the reset tick checks for elapsed windows, in milliseconds
    /// (default: 1000).
    #[serde(default = "default_reset_tick_ms")]
    pub reset_tick_ms: u64,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024 // 16MB
}

fn default_messages_per_window() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_text_bytes() -> usize {
    10 * 1024 // 10KB
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_global_messages_per_second() -> u32 {
    1000
}

fn default_reset_tick_ms() -> u64 {
    1000
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_connections: default_max_connections(),
            broadcast_capacity: default_broadcast_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            messages_per_window: default_messages_per_window(),
            window_secs: default_window_secs(),
            max_text_bytes: default_max_text_bytes(),
            max_image_bytes: default_max_image_bytes(),
            global_messages_per_second: default_global_messages_per_second(),
            reset_tick_ms: default_reset_tick_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl LimitsConfig {
    /// Per-connection admission policy.
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            max_messages: self.messages_per_window,
            window: Duration::from_secs(self.window_secs),
            max_text_bytes: self.max_text_bytes,
            max_image_bytes: self.max_image_bytes,
        }
    }

    /// Interval of the window reset tick.
    pub fn reset_tick(&self) -> Duration {
        Duration::from_millis(self.reset_tick_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let checks: [(&'static str, bool); 8] = [
            ("limits.messages_per_window", limits.messages_per_window > 0),
            ("limits.window_secs", limits.window_secs > 0),
            ("limits.max_text_bytes", limits.max_text_bytes > 0),
            ("limits.max_image_bytes", limits.max_image_bytes > 0),
            (
                "limits.global_messages_per_second",
                limits.global_messages_per_second > 0,
            ),
            ("limits.reset_tick_ms", limits.reset_tick_ms > 0),
            ("server.max_connections", self.server.max_connections > 0),
            (
                "server.broadcast_capacity",
                self.server.broadcast_capacity > 0,
            ),
        ];
        if let Some(&(field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.server.max_frame_bytes < limits.max_image_bytes.max(limits.max_text_bytes) {
            return Err(ConfigError::Invalid {
                field: "server.max_frame_bytes",
                reason: "must be at least as large as the payload limits".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
