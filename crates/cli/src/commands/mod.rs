pub mod call;
pub mod config_cmd;
pub mod models;
pub mod serve;
pub mod stdio;

use std::sync::Arc;

use rlmgate_agent::{Orchestrator, RequestHandler};
use rlmgate_config::AppConfig;

/// Load configuration and pin the data directory to an absolute path.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.data_dir = std::path::absolute(&config.data_dir)?;
    Ok(config)
}

/// Build the request handler every transport shares.
pub fn build_handler(config: &AppConfig) -> Result<RequestHandler, Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::from_config(config)?;
    Ok(RequestHandler::new(Arc::new(orchestrator)))
}
