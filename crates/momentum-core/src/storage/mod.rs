pub mod config;
pub mod database;
pub mod settings;

pub use config::{AlarmSection, ChallengeConfig, Config, DisarmPolicy, RelayConfig, SoundConfig};
pub use database::{ChallengeOutcome, ChallengeRecord, Database, Stats};
pub use settings::{keys, AlarmConfig, EmailConfig, KvStore, Settings};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/momentum-maker[-dev]/` based on MOMENTUM_ENV.
///
/// Set MOMENTUM_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("MOMENTUM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("momentum-maker-dev")
    } else {
        base_dir.join("momentum-maker")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
