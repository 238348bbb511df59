//! Configuration for the Neurovex streaming core.

use crate::core::classifier::CognitiveState;
use crate::core::spectral::DEFAULT_BAND_EDGES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How actuator and safety devices are handed to sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    /// Every session gets its own safety gate and actuator board.
    #[default]
    Isolated,
    /// All sessions drive one physical device and share one emergency-stop latch.
    Shared,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::Isolated => "isolated",
            DeviceMode::Shared => "shared",
        }
    }
}

/// Main configuration for the streaming core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Samples per second delivered by the signal source
    pub sample_rate: u32,

    /// Length of the rolling analysis window in seconds
    pub buffer_window_seconds: u32,

    /// Duration of one orchestrator tick
    #[serde(with = "duration_millis")]
    pub tick_duration: Duration,

    /// Longest the orchestrator waits for an inbound command each tick
    #[serde(with = "duration_millis")]
    pub command_poll_budget: Duration,

    /// Minimum signal quality (percent) for actuator output to be trusted
    pub signal_quality_threshold: f64,

    /// Fatigue level (percent) above which the vehicle is locked out
    pub fatigue_lockout_threshold: f64,

    /// Whether sessions share one device or get their own
    pub device_mode: DeviceMode,

    /// State the built-in simulator is asked to produce
    pub simulated_state: CognitiveState,

    /// Quality reported by the built-in simulator
    pub simulated_quality: f64,

    /// Per-chunk probability of an injected blink artifact in simulation
    pub artifact_probability: f64,

    /// Port for the WebSocket/HTTP server
    pub server_port: u16,

    /// Path for audit stats and band logs
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neurovex");

        Self {
            sample_rate: 250,
            buffer_window_seconds: 2,
            tick_duration: Duration::from_millis(100),
            command_poll_budget: Duration::from_millis(10),
            signal_quality_threshold: 80.0,
            fatigue_lockout_threshold: 80.0,
            device_mode: DeviceMode::Isolated,
            simulated_state: CognitiveState::Focus,
            simulated_quality: 95.0,
            artifact_probability: 0.05,
            server_port: 8000,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neurovex")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Path of the persisted audit statistics.
    pub fn audit_path(&self) -> PathBuf {
        self.data_path.join("audit.json")
    }

    /// Path of the JSON-lines band log.
    pub fn band_log_path(&self) -> PathBuf {
        self.data_path.join("band_logs.jsonl")
    }

    /// Number of samples held by the rolling buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.sample_rate as usize * self.buffer_window_seconds as usize
    }

    /// Number of samples pulled from the source each tick.
    pub fn chunk_len(&self) -> usize {
        (self.sample_rate as f64 * self.tick_duration.as_secs_f64()).round() as usize
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.buffer_window_seconds == 0 {
            return Err(ConfigError::Invalid(
                "buffer_window_seconds must be positive".into(),
            ));
        }
        if self.tick_duration.is_zero() {
            return Err(ConfigError::Invalid("tick_duration must be positive".into()));
        }
        if self.command_poll_budget >= self.tick_duration {
            return Err(ConfigError::Invalid(format!(
                "command_poll_budget ({} ms) must be shorter than tick_duration ({} ms)",
                self.command_poll_budget.as_millis(),
                self.tick_duration.as_millis()
            )));
        }

        let chunk_len = self.chunk_len();
        let capacity = self.buffer_capacity();
        if chunk_len == 0 {
            return Err(ConfigError::Invalid(
                "tick_duration is shorter than one sample".into(),
            ));
        }
        if chunk_len > capacity {
            return Err(ConfigError::Invalid(format!(
                "chunk of {chunk_len} samples exceeds buffer capacity of {capacity}"
            )));
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        if let Some(edge) = DEFAULT_BAND_EDGES.iter().find(|e| e.high_hz > nyquist) {
            return Err(ConfigError::Invalid(format!(
                "{} band upper edge {} Hz is above the Nyquist frequency {} Hz",
                edge.band.name(),
                edge.high_hz,
                nyquist
            )));
        }

        for (name, value) in [
            ("signal_quality_threshold", self.signal_quality_threshold),
            ("fatigue_lockout_threshold", self.fatigue_lockout_threshold),
            ("simulated_quality", self.simulated_quality),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite")));
            }
        }
        if !(0.0..=1.0).contains(&self.artifact_probability) {
            return Err(ConfigError::Invalid(
                "artifact_probability must be within [0, 1]".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 250);
        assert_eq!(config.buffer_window_seconds, 2);
        assert_eq!(config.tick_duration, Duration::from_millis(100));
        assert_eq!(config.signal_quality_threshold, 80.0);
        assert_eq!(config.fatigue_lockout_threshold, 80.0);
        assert_eq!(config.device_mode, DeviceMode::Isolated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_sizing() {
        let config = Config::default();
        assert_eq!(config.buffer_capacity(), 500);
        assert_eq!(config.chunk_len(), 25);
    }

    #[test]
    fn test_chunk_longer_than_buffer_rejected() {
        let config = Config {
            buffer_window_seconds: 1,
            tick_duration: Duration::from_millis(1500),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_low_sample_rate_rejected_by_band_edges() {
        let config = Config {
            sample_rate: 80,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn test_poll_budget_must_fit_in_tick() {
        let config = Config {
            command_poll_budget: Duration::from_millis(100),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["tick_duration"], 100);
        assert_eq!(json["command_poll_budget"], 10);
        assert_eq!(json["device_mode"], "isolated");
        assert_eq!(json["simulated_state"], "focus");

        let parsed: Config =
            serde_json::from_str(r#"{"sample_rate": 500, "device_mode": "shared"}"#).unwrap();
        assert_eq!(parsed.sample_rate, 500);
        assert_eq!(parsed.device_mode, DeviceMode::Shared);
        assert_eq!(parsed.tick_duration, Duration::from_millis(100));
    }
}
