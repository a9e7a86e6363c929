//! Configuration management for m2ha
//!
//! Handles loading, validating, and hot-reloading of the YAML configuration.
//! Every field has a default so the bridge also runs without a config file.

pub mod watcher;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::control_mapping::CHANNEL_COUNT;

pub use watcher::ConfigWatcher;

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "m2ha.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub home_assistant: HomeAssistantConfig,
    pub throttle: ThrottleConfig,
    pub entities: EntitiesConfig,
}

/// MIDI input configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Input port name (exact match preferred, substring accepted)
    pub device: String,
}

/// Home Assistant REST API configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HomeAssistantConfig {
    pub base_url: String,
    /// Environment variable holding the long-lived access token
    pub token_env: String,
    pub request_timeout_ms: u64,
}

/// Outbound rate limiting
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum time between two service calls; zero or negative disables throttling
    pub min_interval_us: i64,
    /// How often the dispatcher checks for a pending command
    pub tick_interval_ms: u64,
}

/// Entity bindings per channel strip
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    /// Switch toggled by the Play button
    pub play_toggle: String,
    /// Channel (1-8) → entity while Cycle is released
    pub unshifted: BTreeMap<u8, String>,
    /// Channel (1-8) → entity while Cycle is held
    pub shifted: BTreeMap<u8, String>,
}

impl AppConfig {
    /// Load and validate configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load the config file if it exists, falling back to defaults
    ///
    /// Returns whether a file was actually read.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Ok((Self::load(path).await?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Parse and validate YAML text
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(yaml).context("Failed to parse YAML config")?;

        config.validate()?;
        Ok(config)
    }

    /// Check constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.home_assistant.base_url.trim().is_empty() {
            bail!("home_assistant.base_url must not be empty");
        }
        if self.throttle.tick_interval_ms == 0 {
            bail!("throttle.tick_interval_ms must be greater than zero");
        }
        for (bank, map) in [
            ("entities.unshifted", &self.entities.unshifted),
            ("entities.shifted", &self.entities.shifted),
        ] {
            if let Some(channel) = map
                .keys()
                .find(|c| !(1..=CHANNEL_COUNT).contains(*c))
            {
                bail!(
                    "{}: channel {} is out of range (1-{})",
                    bank,
                    channel,
                    CHANNEL_COUNT
                );
            }
        }
        Ok(())
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub device: Option<String>,
    pub min_interval_us: Option<i64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(device) = &self.device {
            config.midi.device = device.clone();
        }
        if let Some(interval) = self.min_interval_us {
            config.throttle.min_interval_us = interval;
        }
    }
}

impl HomeAssistantConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ThrottleConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123".to_string(),
            token_env: "TOKEN".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_us: 100_000,
            tick_interval_ms: 5,
        }
    }
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            play_toggle: "switch.0x282c02bfffee12e7".to_string(),
            unshifted: BTreeMap::from([(1, "light.0xb0ce1814001af427".to_string())]),
            shifted: BTreeMap::new(),
        }
    }
}

fn default_device() -> String {
    "nanoKONTROL2 nanoKONTROL2 _ CTR".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.throttle.min_interval_us, 100_000);
        assert_eq!(config.home_assistant.token_env, "TOKEN");
        assert_eq!(
            config.entities.unshifted.get(&1).map(String::as_str),
            Some("light.0xb0ce1814001af427")
        );
    }

    #[test]
    fn test_comment_only_document_uses_defaults() {
        let config = AppConfig::parse("# nothing configured yet\n").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
home_assistant:
  base_url: "http://10.0.0.5:8123"
throttle:
  min_interval_us: 250000
entities:
  shifted:
    1: "light.kitchen"
"#;
        let config = AppConfig::parse(yaml).unwrap();

        assert_eq!(config.home_assistant.base_url, "http://10.0.0.5:8123");
        assert_eq!(config.home_assistant.request_timeout_ms, 10_000);
        assert_eq!(config.throttle.min_interval_us, 250_000);
        assert_eq!(config.throttle.tick_interval_ms, 5);
        assert_eq!(config.entities.shifted.get(&1).unwrap(), "light.kitchen");
        assert_eq!(config.entities.play_toggle, "switch.0x282c02bfffee12e7");
        assert_eq!(config.midi.device, "nanoKONTROL2 nanoKONTROL2 _ CTR");
    }

    #[test]
    fn test_rejects_out_of_range_channel() {
        let yaml = r#"
entities:
  unshifted:
    9: "light.nowhere"
"#;
        let err = AppConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("entities.unshifted"));
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let err = AppConfig::parse("throttle:\n  tick_interval_ms: 0\n").unwrap_err();
        assert!(err.to_string().contains("tick_interval_ms"));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(AppConfig::parse("midi: [unterminated").is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = AppConfig::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config, AppConfig::default());

        let overrides = Overrides {
            device: Some("Arturia BeatStep".to_string()),
            min_interval_us: Some(50_000),
        };
        overrides.apply(&mut config);

        assert_eq!(config.midi.device, "Arturia BeatStep");
        assert_eq!(config.throttle.min_interval_us, 50_000);
        assert_eq!(config.throttle.tick_interval_ms, 5);
    }

    #[tokio::test]
    async fn test_load_or_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let missing = temp_dir.path().join("missing.yaml");

        let (config, loaded) = AppConfig::load_or_default(&missing).await?;
        assert!(!loaded);
        assert_eq!(config, AppConfig::default());

        let present = temp_dir.path().join("m2ha.yaml");
        std::fs::write(&present, "midi:\n  device: \"Launch Control XL\"\n")?;

        let (config, loaded) = AppConfig::load_or_default(&present).await?;
        assert!(loaded);
        assert_eq!(config.midi.device, "Launch Control XL");

        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(temp_dir.path().join("nope.yaml")).await;
        assert!(result.is_err());
    }
}
