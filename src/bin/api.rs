use goldn_max::{
    api::start_server,
    bootstrap::{build_session, spawn_local_init},
    config::AssistantConfig,
    session::NoopObserver,
    voice::{LogSpeechSink, SpeechController},
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

    if !config.remote_key_configured() {
        info!("GOLDN_REMOTE_API_KEY not set; fresh-topic questions stay local/offline");
    }

    info!("Goldn MAX - API Server");
    info!("Port: {}", config.port);

    let session = Arc::new(build_session(
        &config,
        Arc::new(NoopObserver),
        Arc::new(SpeechController::new(LogSpeechSink)),
    )?);
    spawn_local_init(&session);

    info!("Session initialized, starting API server...");

    start_server(session, config.port).await?;

    Ok(())
}
