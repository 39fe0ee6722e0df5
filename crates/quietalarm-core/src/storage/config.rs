//! TOML-based engine configuration.
//!
//! Stores the engine's tunables:
//! - Snooze delay and the labels shown on a snoozed alarm
//! - Alarm tone and where tone assets live
//! - Whether the host timer may wake the device from idle
//!
//! Configuration is stored at `~/.config/quietalarm/config.toml`. Quiet hours
//! settings are not here; they live in the kv store so external surfaces can
//! edit them.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};

/// Snooze behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_snooze_delay_secs")]
    pub snooze_delay_secs: u64,
    #[serde(default = "default_snooze_title")]
    pub snooze_title: String,
    #[serde(default = "default_snooze_body")]
    pub snooze_body: String,
}

/// Alarm tone configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Tone asset name, without extension.
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Directory searched for tone assets. Defaults to `<data_dir>/tones`.
    #[serde(default)]
    pub tone_dir: Option<String>,
}

/// Host timer capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Request wake-from-idle exact alarms. Off forces the plain exact mode.
    #[serde(default = "default_true")]
    pub exact_while_idle: bool,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/quietalarm/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

const MAX_SNOOZE_DELAY_SECS: u64 = 24 * 60 * 60;

fn default_snooze_delay_secs() -> u64 {
    60
}
fn default_snooze_title() -> String {
    "Wake Up!".into()
}
fn default_snooze_body() -> String {
    "Snoozed Alarm".into()
}
fn default_tone() -> String {
    "second_alarm".into()
}
fn default_true() -> bool {
    true
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            snooze_delay_secs: default_snooze_delay_secs(),
            snooze_title: default_snooze_title(),
            snooze_body: default_snooze_body(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            tone_dir: None,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            exact_while_idle: true,
        }
    }
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::from(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load engine config, using defaults");
            Self::default()
        })
    }

    /// Snooze delay, capped at one day.
    pub fn snooze_delay(&self) -> Duration {
        Duration::seconds(self.alarm.snooze_delay_secs.min(MAX_SNOOZE_DELAY_SECS) as i64)
    }

    /// Directory holding tone assets.
    pub fn tone_dir(&self) -> Result<PathBuf> {
        match &self.audio.tone_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(data_dir()?.join("tones")),
        }
    }
}
