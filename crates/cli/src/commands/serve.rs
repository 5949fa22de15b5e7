//! `joi serve`: Start the HTTP/WebSocket gateway.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Joi gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   WebSocket: ws://{}:{}/ws/{{client_id}}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);

    joi_gateway::start(config).await?;

    Ok(())
}
