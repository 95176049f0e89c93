use crate::escalation::EngineConfig;
use crate::escalation::session::SessionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_WINDOW_SECS: u64 = 8;
pub const DEFAULT_CADENCE_MS: u64 = 1_000;
pub const DEFAULT_CORROBORATION_MS: u64 = 2_000;
pub const DEFAULT_COUNTDOWN_SECS: u64 = 45;
pub const DEFAULT_TRIGGER_PROBABILITY: f64 = 0.75;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub detection: Option<DetectionSection>,
    #[serde(default)]
    pub signal: Option<SignalSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionSection {
    /// Signal window duration in seconds (default: 8)
    pub window_secs: Option<u64>,
    /// Evaluation cadence in milliseconds (default: 1000)
    pub cadence_ms: Option<u64>,
    /// Corroboration grace period in milliseconds (default: 2000)
    pub corroboration_ms: Option<u64>,
    /// Countdown duration in seconds (default: 45)
    pub countdown_secs: Option<u64>,
    /// Probability at which an assessment opens a candidate (default: 0.75)
    pub trigger_probability: Option<f64>,
    /// Retraction threshold (default: half the trigger probability)
    pub retraction_probability: Option<f64>,
    /// Path to the classifier tuning file
    pub tuning_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalSection {
    /// Optional JSONL ride capture to replay instead of live ingestion
    pub replay_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn tuning_path(&self) -> Option<&Path> {
        let path = self.detection.as_ref()?.tuning_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn replay_path(&self) -> Option<&Path> {
        let path = self.signal.as_ref()?.replay_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    /// Engine timing and thresholds assembled from `[detection]` with defaults.
    pub fn engine_config(&self) -> EngineConfig {
        let detection = self.detection.as_ref();
        let trigger = detection
            .and_then(|d| d.trigger_probability)
            .unwrap_or(DEFAULT_TRIGGER_PROBABILITY);
        let retraction = detection
            .and_then(|d| d.retraction_probability)
            .unwrap_or(trigger / 2.0);
        EngineConfig {
            window: Duration::from_secs(
                detection
                    .and_then(|d| d.window_secs)
                    .unwrap_or(DEFAULT_WINDOW_SECS),
            ),
            cadence: Duration::from_millis(
                detection
                    .and_then(|d| d.cadence_ms)
                    .unwrap_or(DEFAULT_CADENCE_MS),
            ),
            session: SessionConfig {
                trigger_probability: trigger,
                retraction_probability: retraction,
                corroboration: Duration::from_millis(
                    detection
                        .and_then(|d| d.corroboration_ms)
                        .unwrap_or(DEFAULT_CORROBORATION_MS),
                ),
                countdown: Duration::from_secs(
                    detection
                        .and_then(|d| d.countdown_secs)
                        .unwrap_or(DEFAULT_COUNTDOWN_SECS),
                ),
            },
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }
}
