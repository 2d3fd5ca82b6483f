//! Engine configuration
//!
//! Everything the settings layer persists (color mode, colorblind flag,
//! tracked channels, selected universe) arrives here as plain input; the
//! engine never reads or writes storage itself.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::activity::DecayPolicy;
use super::color::ColorMode;
use super::error::ConfigError;
use super::source::{Channel, Universe, CHANNELS_PER_UNIVERSE};
use super::timeseries::MAX_TRACKED;

/// Environment variable naming a JSON config file for the CLI
pub const CONFIG_ENV: &str = "DMX_TELEMETRY_CONFIG";

/// Constants for the activity estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Multiplicative decay per update (0.0 = instant zero, 1.0 = no decay)
    pub decay: f32,
    /// Scale applied to `|v - prev| / 255` under the continuous policy
    pub continuous_gain: f32,
    /// Fixed boost per change under the discrete policy
    pub discrete_boost: f32,
    pub poll_policy: DecayPolicy,
    pub push_policy: DecayPolicy,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            decay: 0.95,
            continuous_gain: 0.5,
            discrete_boost: 0.15,
            poll_policy: DecayPolicy::ContinuousChange,
            push_policy: DecayPolicy::DiscreteChange,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time-series window per tracked channel
    pub window_seconds: u64,
    /// Maximum number of tracked channels, at most `MAX_TRACKED`
    pub max_tracked: usize,
    /// Tick period for decay and pruning
    pub tick_interval_ms: u64,
    pub activity: ActivityConfig,
    pub color_mode: ColorMode,
    pub colorblind: bool,
    /// Select the lowest advertised universe when nothing is selected
    pub auto_select_universe: bool,
    /// Also fetch the selected universe on every tick
    pub poll_selected: bool,
    pub selected_universe: Option<Universe>,
    pub tracked_channels: Vec<Channel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30,
            max_tracked: 10,
            tick_interval_ms: 100,
            activity: ActivityConfig::default(),
            color_mode: ColorMode::Level,
            colorblind: false,
            auto_select_universe: true,
            poll_selected: false,
            selected_universe: None,
            tracked_channels: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn window_ms(&self) -> u64 {
        self.window_seconds.saturating_mul(1000)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::Invalid("window_seconds must be > 0"));
        }
        if !(1..=MAX_TRACKED).contains(&self.max_tracked) {
            return Err(ConfigError::Invalid("max_tracked must be in 1..=10"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.activity.decay) {
            return Err(ConfigError::Invalid("activity.decay must be in [0, 1]"));
        }
        if self.activity.continuous_gain < 0.0 || self.activity.discrete_boost < 0.0 {
            return Err(ConfigError::Invalid("activity boosts must be >= 0"));
        }
        if self
            .tracked_channels
            .iter()
            .any(|&ch| ch == 0 || ch as usize > CHANNELS_PER_UNIVERSE)
        {
            return Err(ConfigError::Invalid("tracked_channels must be in 1..=512"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window_ms(), 30_000);
        assert_eq!(config.max_tracked, 10);
        assert_eq!(config.activity.decay, 0.95);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"window_seconds": 5, "color_mode": "lastUsed", "activity": {"push_policy": "continuousChange"}}"#,
        )
        .unwrap();
        assert_eq!(config.window_seconds, 5);
        assert_eq!(config.color_mode, ColorMode::LastUsed);
        assert_eq!(config.activity.push_policy, DecayPolicy::ContinuousChange);
        assert_eq!(config.activity.discrete_boost, 0.15);
        assert_eq!(config.max_tracked, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"window_seconds": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"tracked_channels": [0]}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"activity": {"decay": 1.5}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_tracked": 20}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_tracked": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/dmx-telemetry.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
