pub mod chat;
pub mod config_cmd;
pub mod serve;
pub mod tools;

use joi_config::AppConfig;

/// Load the configuration, with a readable error.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
