use finance_assistant::{
    config::AssistantConfig,
    models::ChatMode,
    rate_limit::RateGovernor,
    session::{AssistantSession, SessionBackends},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Usage: assistant [--ai] <message...>
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match args.first().map(String::as_str) {
        Some("--ai") => {
            args.remove(0);
            ChatMode::Ai
        }
        _ => ChatMode::Local,
    };
    let text = if args.is_empty() {
        "show me bill analytics and reports".to_string()
    } else {
        args.join(" ")
    };

    let config = AssistantConfig::from_env();
    let backends = SessionBackends::from_config(&config)?;
    let governor = Arc::new(RateGovernor::new(config.rate_limit.clone()));
    let identity = std::env::var("ASSISTANT_USER_ID").ok();
    let session = AssistantSession::new("cli", identity, config, backends, governor);

    info!("Finance assistant starting");

    session.refresh_financial_summary().await;
    let response = session.send_turn(&text, mode).await;

    info!(
        source = ?response.source,
        actions = response.quick_actions.len(),
        "Turn complete"
    );

    println!("\n{}", "=".repeat(60));
    println!("{}", serde_json::to_string_pretty(&response)?);
    println!("{}", "=".repeat(60));

    Ok(())
}
