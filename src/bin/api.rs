use finance_assistant::{
    api::{start_server, SessionRegistry},
    config::{server_port, AssistantConfig},
    session::SessionBackends,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AssistantConfig::from_env();
    let api_port = server_port();

    info!("🚀 Finance Assistant - API Server");
    info!("📍 Port: {}", api_port);
    info!(
        "⏱️  Rate limit: {} requests / {:?}",
        config.rate_limit.max_requests, config.rate_limit.window
    );

    let backends = SessionBackends::from_config(&config)?;
    let registry = Arc::new(SessionRegistry::new(config, backends));

    info!("✅ Session registry initialized");
    info!("📡 Starting API server...");

    start_server(registry, api_port).await?;

    Ok(())
}
