// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Startup configuration for mcsnoopd.
//!
//! JSON5 format, so comments and trailing commas are accepted:
//!
//! ```json5
//! {
//!     control_socket: "/tmp/mcsnoop_control.sock",
//!     max_ports: 128,
//!     logging: { level: "info", format: "json", facilities: { "Classifier": "debug" } },
//!     prometheus_addr: "127.0.0.1:9464",
//!     timeouts: { "query_timeout": 60000 },
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging::{Facility, Severity};
use crate::timeout::TimeoutName;
use crate::validation;

pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/mcsnoop_control.sock";
pub const DEFAULT_MAX_PORTS: u32 = 256;

/// Agent startup configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Unix socket the control shim listens on
    #[serde(default = "default_control_socket")]
    pub control_socket: PathBuf,

    /// Number of switch ports; port numbers must be below this
    #[serde(default = "default_max_ports")]
    pub max_ports: u32,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Serve Prometheus metrics on this address when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_addr: Option<SocketAddr>,

    /// Initial timeout-table rows, in milliseconds
    #[serde(default)]
    pub timeouts: HashMap<TimeoutName, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: Severity,

    #[serde(default)]
    pub format: LogFormat,

    /// Per-facility minimum levels overriding `level`
    #[serde(default)]
    pub facilities: HashMap<Facility, Severity>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Plain text on stdout
    #[default]
    Plain,
    /// Plain text on stderr
    PlainStderr,
    /// One JSON object per line on stdout
    Json,
}

fn default_control_socket() -> PathBuf {
    PathBuf::from(DEFAULT_CONTROL_SOCKET)
}

fn default_max_ports() -> u32 {
    DEFAULT_MAX_PORTS
}

fn default_level() -> Severity {
    Severity::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            facilities: HashMap::new(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_socket: default_control_socket(),
            max_ports: default_max_ports(),
            logging: LoggingConfig::default(),
            prometheus_addr: None,
            timeouts: HashMap::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Pretty-printed JSON, which is also valid JSON5
    pub fn to_json5(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json5())
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_socket.as_os_str().is_empty() {
            return Err(ConfigError::EmptySocketPath);
        }
        if self.max_ports == 0 {
            return Err(ConfigError::InvalidMaxPorts(self.max_ports));
        }
        for (name, interval_ms) in &self.timeouts {
            validation::validate_interval_ms(*interval_ms, name.as_str()).map_err(|reason| {
                ConfigError::InvalidTimeout {
                    name: *name,
                    reason,
                }
            })?;
        }
        Ok(())
    }

    /// Initial timeout rows, in a stable order
    pub fn initial_timeouts(&self) -> Vec<(TimeoutName, Duration)> {
        TimeoutName::ALL
            .into_iter()
            .filter_map(|name| {
                self.timeouts
                    .get(&name)
                    .map(|ms| (name, Duration::from_millis(u64::from(*ms))))
            })
            .collect()
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(PathBuf, String),
    ParseError(String),
    EmptySocketPath,
    InvalidMaxPorts(u32),
    InvalidTimeout { name: TimeoutName, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::EmptySocketPath => write!(f, "control_socket cannot be empty"),
            ConfigError::InvalidMaxPorts(n) => {
                write!(f, "max_ports must be at least 1, got {}", n)
            }
            ConfigError::InvalidTimeout { name, reason } => {
                write!(f, "invalid timeout '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
