// Runtime configuration, environment-driven.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "equipment.db";

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file. `EQUIPMENT_DB` overrides.
    pub database_path: PathBuf,
    /// Log filter directive for the subscriber. `EQUIPMENT_LOG` overrides.
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            database_path: env::var("EQUIPMENT_DB")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
                .into(),
            log_filter: env::var("EQUIPMENT_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
