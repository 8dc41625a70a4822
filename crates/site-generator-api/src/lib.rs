//! Site Generator REST API
//!
//! HTTP front end for the site generation pipeline. A client picks a
//! template, submits a profile, and gets back either a zip of the rendered
//! site or a link to a preview that lives for a limited time.
//!
//! ## Endpoints
//!
//! - `GET /templates` - List installed templates
//! - `GET /templates/{id}/{*path}` - Static files of a template (thumbnails)
//! - `POST /generate` - Render a site and download it as a zip
//! - `POST /generate-preview` - Render a site for preview
//! - `GET /preview/{id}` - Rendered preview page
//! - `GET /preview/{id}/assets/{*path}` - Preview assets
//! - `GET /health` - Health check

pub mod config;
pub mod handlers;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use site_generator::{Renderer, SiteGenerator, TemplateCatalog, WorkspaceManager, WorkspaceTtls};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;

/// Route prefix previews are served under
pub const PREVIEW_ROUTE: &str = "/preview";

/// Default request body limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Generation pipeline
    pub generator: SiteGenerator,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl AppState {
    /// Create new application state
    pub fn new(templates_dir: PathBuf, workspace_dir: PathBuf, ttls: WorkspaceTtls) -> Self {
        let workspaces = Arc::new(WorkspaceManager::new(workspace_dir, ttls));

        Self {
            generator: SiteGenerator::new(
                TemplateCatalog::new(templates_dir),
                Renderer::new(PREVIEW_ROUTE),
                workspaces,
            ),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            ..Self::new(
                config.templates_dir.clone(),
                config.workspace_dir.clone(),
                config.workspace_ttls(),
            )
        }
    }

    pub fn workspaces(&self) -> Arc<WorkspaceManager> {
        self.generator.workspaces().clone()
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    let state = Arc::new(state);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        // Template catalog
        .route("/templates", get(handlers::list_templates_handler))
        .route(
            "/templates/{id}/{*path}",
            get(handlers::template_file_handler),
        )
        // Generation
        .route("/generate", post(handlers::generate_handler))
        .route("/generate-preview", post(handlers::generate_preview_handler))
        // Previews
        .route("/preview/{id}", get(handlers::preview_handler))
        .route(
            "/preview/{id}/assets/{*path}",
            get(handlers::preview_asset_handler),
        )
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(security_headers))
        .layer(
            CorsLayer::permissive(), // Form UI is served from another origin
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Hardening headers; previews stay frameable so the form UI can embed them
async fn security_headers(request: Request, next: Next) -> Response {
    let is_preview = request.uri().path().starts_with(PREVIEW_ROUTE);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    if !is_preview {
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    }

    response
}
