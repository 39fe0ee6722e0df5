mod config;
pub mod database;
pub mod settings;

pub use config::{AlarmConfig, AudioConfig, EngineConfig, TimerConfig};
pub use database::Database;
pub use settings::{MemorySettingsStore, SettingsStore, SqliteSettingsStore};

use std::path::PathBuf;

/// Returns `~/.config/quietalarm[-dev]/` based on QUIETALARM_ENV.
///
/// Set QUIETALARM_ENV=dev to use development data directory.
/// QUIETALARM_DATA_DIR overrides both.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("QUIETALARM_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUIETALARM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("quietalarm-dev")
    } else {
        base_dir.join("quietalarm")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
