use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

pub const MIN_TOKEN_MINUTES: i64 = 5;
pub const MAX_TOKEN_MINUTES: i64 = 180;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_url: String,
    /// Lifetime offered for new QR tokens when the lecturer doesn't pick one.
    pub default_token_minutes: i64,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(Self::from_env)
    }

    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized")
    }

    pub fn from_env() -> Self {
        let project_name =
            env::var("PROJECT_NAME").unwrap_or_else(|_| "attendance-engine".into());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/attendance.log".into());
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let default_token_minutes = env::var("DEFAULT_TOKEN_MINUTES")
            .ok()
            .and_then(|m| m.parse::<i64>().ok())
            .unwrap_or(15)
            .clamp(MIN_TOKEN_MINUTES, MAX_TOKEN_MINUTES);

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            fs::create_dir_all(parent).expect("Failed to create log directory");
        }

        Config {
            project_name,
            log_level,
            log_file,
            database_url,
            default_token_minutes,
        }
    }
}
