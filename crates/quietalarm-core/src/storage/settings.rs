//! Quiet hours settings persistence.
//!
//! Settings are kept as seven flat keys in the kv table:
//!
//! | key | value |
//! |-----|-------|
//! | `quiet_hours_enabled` | `true` / `false` |
//! | `quiet_hours_start_hour` | `0..=23` |
//! | `quiet_hours_start_minute` | `0..=59` |
//! | `quiet_hours_end_hour` | `0..=23` |
//! | `quiet_hours_end_minute` | `0..=59` |
//! | `quiet_hours_days` | comma-separated Monday-first indices |
//! | `quiet_hours_exception_safety_critical` | `true` / `false` |
//!
//! A missing key reads as its default. A malformed value is logged and read
//! as its default too, so one bad key never disables the others.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use super::database::Database;
use crate::error::{DatabaseError, Result};
use crate::quiet_hours::{DaySet, MinuteOfDay, QuietHoursConfig};

pub const KEY_PREFIX: &str = "quiet_hours_";
pub const KEY_ENABLED: &str = "quiet_hours_enabled";
pub const KEY_START_HOUR: &str = "quiet_hours_start_hour";
pub const KEY_START_MINUTE: &str = "quiet_hours_start_minute";
pub const KEY_END_HOUR: &str = "quiet_hours_end_hour";
pub const KEY_END_MINUTE: &str = "quiet_hours_end_minute";
pub const KEY_DAYS: &str = "quiet_hours_days";
pub const KEY_EXCEPTION_SAFETY_CRITICAL: &str = "quiet_hours_exception_safety_critical";

/// Durable storage for [`QuietHoursConfig`].
///
/// `load` must observe either the previous or the new value of a concurrent
/// `save`, never a mix.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<QuietHoursConfig>;
    fn save(&self, config: &QuietHoursConfig) -> Result<()>;
}

/// [`SettingsStore`] on top of the SQLite kv table.
pub struct SqliteSettingsStore {
    db: Mutex<Database>,
}

impl SqliteSettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the store in the default data directory.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Database::open()?))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<QuietHoursConfig> {
        let db = self.db.lock().map_err(|_| DatabaseError::Poisoned)?;
        let raw = db.kv_get_prefix(KEY_PREFIX)?;
        Ok(decode(&raw))
    }

    fn save(&self, config: &QuietHoursConfig) -> Result<()> {
        let mut db = self.db.lock().map_err(|_| DatabaseError::Poisoned)?;
        db.kv_set_many(&encode(config))?;
        tracing::info!(
            enabled = config.enabled,
            start = %config.start,
            end = %config.end,
            days = %config.active_days.to_list_string(),
            bypass_safety_critical = config.bypass_safety_critical,
            "quiet hours settings saved"
        );
        Ok(())
    }
}

/// Process-local [`SettingsStore`].
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    config: RwLock<QuietHoursConfig>,
}

impl MemorySettingsStore {
    pub fn new(config: QuietHoursConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<QuietHoursConfig> {
        Ok(*self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, config: &QuietHoursConfig) -> Result<()> {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = *config;
        Ok(())
    }
}

fn encode(config: &QuietHoursConfig) -> Vec<(&'static str, String)> {
    vec![
        (KEY_ENABLED, config.enabled.to_string()),
        (KEY_START_HOUR, config.start.hour().to_string()),
        (KEY_START_MINUTE, config.start.minute().to_string()),
        (KEY_END_HOUR, config.end.hour().to_string()),
        (KEY_END_MINUTE, config.end.minute().to_string()),
        (KEY_DAYS, config.active_days.to_list_string()),
        (
            KEY_EXCEPTION_SAFETY_CRITICAL,
            config.bypass_safety_critical.to_string(),
        ),
    ]
}

fn decode(raw: &BTreeMap<String, String>) -> QuietHoursConfig {
    let defaults = QuietHoursConfig::default();

    let start = minute_of_day(
        raw,
        (KEY_START_HOUR, KEY_START_MINUTE),
        defaults.start,
    );
    let end = minute_of_day(raw, (KEY_END_HOUR, KEY_END_MINUTE), defaults.end);
    let active_days = match raw.get(KEY_DAYS) {
        Some(list) => DaySet::parse_list(list),
        None => defaults.active_days,
    };

    QuietHoursConfig {
        enabled: flag(raw, KEY_ENABLED, defaults.enabled),
        start,
        end,
        active_days,
        bypass_safety_critical: flag(
            raw,
            KEY_EXCEPTION_SAFETY_CRITICAL,
            defaults.bypass_safety_critical,
        ),
    }
}

fn flag(raw: &BTreeMap<String, String>, key: &str, default: bool) -> bool {
    match raw.get(key) {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "malformed stored flag, using default");
            default
        }),
    }
}

fn bounded(raw: &BTreeMap<String, String>, key: &str, max: u32, default: u32) -> u32 {
    match raw.get(key) {
        None => default,
        Some(value) => match value.trim().parse::<u32>() {
            Ok(n) if n <= max => n,
            _ => {
                tracing::warn!(key, value = %value, "malformed stored time, using default");
                default
            }
        },
    }
}

fn minute_of_day(
    raw: &BTreeMap<String, String>,
    (hour_key, minute_key): (&str, &str),
    default: MinuteOfDay,
) -> MinuteOfDay {
    let hour = bounded(raw, hour_key, 23, default.hour());
    let minute = bounded(raw, minute_key, 59, default.minute());
    MinuteOfDay::from_hm(hour, minute).unwrap_or(default)
}
