pub mod alarm;
pub mod config;
pub mod email;
pub mod quiz;
pub mod run;
pub mod stats;

use momentum_core::storage::{Database, Settings};

/// Settings backed by the user's database.
pub fn open_settings() -> Result<Settings<Database>, Box<dyn std::error::Error>> {
    Ok(Settings::new(Database::open()?))
}
