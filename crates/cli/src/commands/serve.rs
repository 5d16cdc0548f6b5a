//! `rlmgate serve`: Start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    eprintln!("rlmgate gateway");
    eprintln!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    eprintln!("   Sessions:  {}", config.data_dir.display());

    rlmgate_gateway::start(config).await?;

    Ok(())
}
