use common::config::Config;
use common::logger::init_logger;
use log::info;
use sea_orm::DatabaseConnection;

use crate::error::AppResult;

/// Loads config from `env_path`, installs the logger, connects and migrates.
///
/// Call once at process start; the returned connection is what every service
/// call takes as its store.
pub async fn init(env_path: &str) -> AppResult<DatabaseConnection> {
    let config = Config::init(env_path);
    init_logger(&config.log_level, &config.log_file);
    info!(
        "{} starting (default token lifetime {} min)",
        config.project_name, config.default_token_minutes
    );

    let db = db::connect(&config.database_url).await?;
    db::migrate(&db).await?;
    Ok(db)
}
