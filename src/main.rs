use portais_crm_webhook::{
    api::{handlers::AppState, server},
    config::Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the CRM gateway and
/// starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portais_crm_webhook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let port = config.port;

    // Build application state (CRM gateway gets its own config slice)
    let app_state = AppState::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize CRM client: {}", e))?;
    if app_state.crm.is_configured() {
        tracing::info!("✓ CRM gateway initialized");
    }

    let app = server::create_router(Arc::new(app_state));

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
