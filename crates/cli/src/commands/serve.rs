//! `foliobot serve`: start the HTTP gateway.

use foliobot_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("foliobot gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Chat:      POST /api/chat (SSE)");
    println!("   Database:  {}", config.database.url);

    foliobot_gateway::start(config).await?;

    Ok(())
}
