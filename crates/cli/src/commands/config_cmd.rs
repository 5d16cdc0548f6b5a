//! `rlmgate config`: Print the effective configuration.

use rlmgate_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    println!("# {}", config_path().display());
    println!("{}", config.to_redacted_toml()?);
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    std::env::var("RLM_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| AppConfig::config_dir().join("config.toml"))
}
