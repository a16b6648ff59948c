//! GIL configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Executive timing and channel settings
    pub executive: ExecutiveConfig,

    /// Simulated integration used by `gil run`
    pub simulation: SimulationConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .gil.yml
        let local_config = PathBuf::from(".gil.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/gil/gil.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gil").join("gil.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Executive timing and channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutiveConfig {
    /// How long `stop` waits for each loop to exit
    #[serde(rename = "join-timeout-ms")]
    pub join_timeout_ms: u64,

    /// Pause between two loop iterations
    #[serde(rename = "loop-yield-ms")]
    pub loop_yield_ms: u64,

    /// Pending control commands per loop
    #[serde(rename = "command-channel-capacity")]
    pub command_channel_capacity: usize,

    /// Minimum time between two connection attempts of a procedure
    #[serde(rename = "reconnect-interval-ms")]
    pub reconnect_interval_ms: u64,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 10_000,
            loop_yield_ms: 1,
            command_channel_capacity: 32,
            reconnect_interval_ms: 1_000,
        }
    }
}

/// Simulated integration used by `gil run`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// External system operating frequency in Hz
    #[serde(rename = "external-system-frequency")]
    pub external_system_frequency: f64,

    /// Process model operating frequency in Hz
    #[serde(rename = "process-model-frequency")]
    pub process_model_frequency: f64,

    /// Signals flowing from the external system to the process model
    #[serde(rename = "signals-to-process-model")]
    pub signals_to_process_model: usize,

    /// Signals flowing from the process model to the external system
    #[serde(rename = "signals-to-external-system")]
    pub signals_to_external_system: usize,

    /// Gain the simulated process model applies to its inputs
    #[serde(rename = "model-gain")]
    pub model_gain: f64,

    /// Default run duration in seconds (0 = until Ctrl-C)
    #[serde(rename = "duration-secs")]
    pub duration_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            external_system_frequency: 20.0,
            process_model_frequency: 50.0,
            signals_to_process_model: 4,
            signals_to_external_system: 4,
            model_gain: 0.5,
            duration_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.executive.join_timeout_ms, 10_000);
        assert_eq!(config.executive.loop_yield_ms, 1);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_load_explicit_file_with_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log-level: DEBUG\nexecutive:\n  join-timeout-ms: 2500\nsimulation:\n  model-gain: 2.0"
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.executive.join_timeout_ms, 2500);
        assert_eq!(config.executive.loop_yield_ms, 1);
        assert_eq!(config.simulation.model_gain, 2.0);
        assert_eq!(config.simulation.signals_to_process_model, 4);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/gil.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "executive: [not, a, map]").unwrap();
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_round_trip_uses_kebab_keys() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("join-timeout-ms"));
        assert!(yaml.contains("external-system-frequency"));
    }
}
