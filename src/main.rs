use std::{net::SocketAddr, sync::Arc};

use dress_designer::{
    config::Config,
    openrouter::OpenRouterClient,
    routes::{router, AppState},
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    match config.api_key.as_deref() {
        Some(_) => tracing::info!("Using API key: {}", config.api_key_hint()),
        None => tracing::warn!("OPENROUTER_API_KEY is not set; relay requests will fail until it is configured"),
    }
    tracing::info!(text_model = %config.text_model, image_model = %config.image_model, "Provider models");

    let provider = Arc::new(OpenRouterClient::new(&config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, provider));

    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
