//! Site Generator API Service
//!
//! REST service that renders portfolio sites from templates and hands them
//! out as zip downloads or time-limited previews.

use anyhow::{Context, Result};
use site_generator_api::config::Config;
use site_generator_api::{create_router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "site_generator=debug,site_generator_api=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Site Generator API Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded - listening on {}",
        config.api_address()
    );

    // Ensure directories exist
    config
        .ensure_directories()
        .context("Failed to create directories")?;
    info!("Templates directory: {}", config.templates_dir.display());
    info!("Workspace directory: {}", config.workspace_dir.display());

    // Create application state
    let state = AppState::from_config(&config);

    // Nothing from a previous run is still reachable
    let workspaces = state.workspaces();
    workspaces
        .purge_stale()
        .await
        .context("Failed to purge stale workspaces")?;
    let sweeper = workspaces.spawn_sweeper(config.sweep_interval());

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Site Generator API listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());
    info!("API endpoints:");
    info!("  GET /templates - List templates");
    info!("  POST /generate - Download site as zip");
    info!("  POST /generate-preview - Create preview");
    info!("  GET /preview/{{id}} - View preview");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    sweeper.abort();

    Ok(())
}
