//! TOML configuration for the wayguard daemon.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! runnable configuration. The CLI takes the file path from `--config` or the
//! `WAYGUARD_CONFIG` environment variable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detect::{DetectError, DetectionConfig, DEFAULT_SAFE_ZONE_THRESHOLD_M};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayguardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WayguardConfig {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .detection
            .to_config()
            .with_context(|| format!("invalid [detection] section in {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration: a given path must load, otherwise the
    /// compiled-in defaults apply. The CLI fills `path` from `--config` or
    /// `WAYGUARD_CONFIG`.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        debug!("no config file given, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP API.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Upper bound on samples loaded for one evaluation window or session
    /// snapshot. Should cover the inactivity window at the expected fix rate.
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/wayguard.db"),
            history_limit: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Thresholds applied to tracked sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub inactivity_threshold_minutes: f64,
    /// Cumulative movement (metres) below which the person counts as stationary.
    pub safe_zone_threshold_meters: f64,
    /// Shown in alerts when a session's zone has no label of its own.
    pub zone_description: String,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            inactivity_threshold_minutes: 5.0,
            safe_zone_threshold_meters: DEFAULT_SAFE_ZONE_THRESHOLD_M,
            zone_description: "designated safe area".to_string(),
        }
    }
}

impl DetectionSettings {
    pub fn to_config(&self) -> Result<DetectionConfig, DetectError> {
        DetectionConfig::new(self.inactivity_threshold_minutes, self.safe_zone_threshold_meters)
    }
}

// ---------------------------------------------------------------------------
// Alert backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Text backend URL. When unset, messages come from the built-in template.
    pub endpoint: Option<String>,
    /// Bearer token sent to the backend.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Default display name for the tracked person.
    pub sender_name: Option<String>,
    /// Default display name for the person receiving alerts.
    pub receiver_name: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 10,
            sender_name: None,
            receiver_name: None,
        }
    }
}

impl AlertConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether `serve` runs the background evaluation loop.
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 5,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (`trace` .. `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
