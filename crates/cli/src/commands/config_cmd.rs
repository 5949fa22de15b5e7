//! `joi config`: Print the effective configuration.

use joi_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", render(&config)?);
    Ok(())
}

/// TOML for `config`, API keys redacted.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&config.redacted())
}
