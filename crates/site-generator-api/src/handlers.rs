//! API request handlers for site generation and previews

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use folio_common::{Error, TemplateDescriptor};
use serde::{Deserialize, Serialize};
use site_generator::catalog::is_safe_template_id;
use site_generator::renderer::{ASSETS_DIR, OUTPUT_FILE};
use site_generator::WorkspaceMode;
use std::io;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};

use crate::{AppState, PREVIEW_ROUTE};

/// Request to generate a site, as a download or a preview
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Template identifier from the catalog
    #[serde(default)]
    pub template_id: serde_json::Value,

    /// Raw profile as submitted by the form
    #[serde(default)]
    pub profile: serde_json::Value,
}

/// Response from preview generation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_id: String,
    pub preview_url: String,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => serde_json::json!({
                "error": self.message,
                "details": details
            }),
            None => serde_json::json!({
                "error": self.message
            }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(fields) => ApiError {
                status: StatusCode::BAD_REQUEST,
                message: "Invalid profile data".to_string(),
                details: serde_json::to_value(fields).ok(),
            },
            Error::TemplateNotFound(_) | Error::PreviewExpired => {
                ApiError::not_found(err.to_string())
            }
            Error::TemplateInvalid(_) => {
                error!("Installed template is invalid: {}", err);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Error::Render(_) | Error::Archive(_) | Error::Io(_) | Error::Json(_) => {
                error!("Request failed: {:?}", err);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "site-generator-api"
    }))
}

/// List installed templates
pub async fn list_templates_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TemplateDescriptor>>, ApiError> {
    info!("Listing templates");

    let templates = state.generator.list_templates().await?;
    Ok(Json(templates))
}

/// Generate a site and stream it back as a zip archive
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (template_id, profile) = parse_request(payload)?;
    info!("Generating download from template: {}", template_id);

    let site = state
        .generator
        .generate(&template_id, &profile, WorkspaceMode::Download)
        .await?;
    let download = state.generator.start_download(site).await?;

    let content_disposition = format!("attachment; filename=\"{}\"", download.file_name);
    let chunks = tokio_stream::once(Ok::<_, io::Error>(download.first_chunk)).chain(download.rest);

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// Generate a site and keep it servable as a preview
pub async fn generate_preview_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let (template_id, profile) = parse_request(payload)?;
    info!("Generating preview from template: {}", template_id);

    let site = state
        .generator
        .generate(&template_id, &profile, WorkspaceMode::Preview)
        .await?;
    let preview = state.generator.publish_preview(site, PREVIEW_ROUTE).await?;

    info!("Preview ready: {}", preview.id);
    Ok(Json(PreviewResponse {
        preview_id: preview.id,
        preview_url: preview.url,
    }))
}

/// Serve a preview's rendered page
pub async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let dir = state.generator.workspaces().lookup(&id).await?;

    match tokio::fs::read_to_string(dir.join(OUTPUT_FILE)).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::PreviewExpired.into()),
        Err(e) => Err(Error::Io(e).into()),
    }
}

/// Serve a static asset of a preview
pub async fn preview_asset_handler(
    State(state): State<Arc<AppState>>,
    Path((id, asset_path)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let dir = state.generator.workspaces().lookup(&id).await?;

    let Some(relative) = safe_relative_path(&asset_path) else {
        warn!("Rejected asset path for preview {}: {:?}", id, asset_path);
        return Err(ApiError::not_found("Asset not found"));
    };

    serve_file(dir.join(ASSETS_DIR).join(relative), request, "Asset not found").await
}

/// Serve a static file (e.g. the thumbnail) shipped with a template
pub async fn template_file_handler(
    State(state): State<Arc<AppState>>,
    Path((template_id, file_path)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    if !is_safe_template_id(&template_id) {
        return Err(Error::TemplateNotFound(template_id).into());
    }

    let Some(relative) = safe_relative_path(&file_path) else {
        return Err(ApiError::not_found("File not found"));
    };

    let root = state.generator.catalog().root().join(&template_id);
    serve_file(root.join(relative), request, "File not found").await
}

fn parse_request(
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<(String, serde_json::Value), ApiError> {
    let Json(request) = payload?;

    let template_id = match request.template_id.as_str() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(ApiError::bad_request("Valid templateId is required")),
    };

    if request.profile.is_null() {
        return Err(ApiError::bad_request("Profile data is required"));
    }

    Ok((template_id, request.profile))
}

/// Accept only plain relative paths: no `..`, `.`, roots or prefixes
fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let path = std::path::Path::new(raw);
    let mut components = path.components().peekable();
    components.peek()?;

    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Content type for the recognized static file extensions
fn content_type_for(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    let mime = match ext.as_str() {
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => return None,
    };

    Some(mime)
}

/// Stream a regular file with `ServeFile`. The content type comes from the
/// table above; unrecognized extensions get none.
async fn serve_file(path: PathBuf, request: Request, not_found: &str) -> Result<Response, ApiError> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ApiError::not_found(not_found)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(not_found));
        }
        Err(e) => return Err(Error::Io(e).into()),
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    match content_type_for(&path) {
        Some(mime) => {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(mime));
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("style.css"), Some(PathBuf::from("style.css")));
        assert_eq!(
            safe_relative_path("fonts/inter.woff2"),
            Some(PathBuf::from("fonts/inter.woff2"))
        );

        for raw in ["", "../secret", "a/../../b", "/etc/passwd", "./style.css", ".."] {
            assert_eq!(safe_relative_path(raw), None, "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_content_type_table() {
        let ct = |p: &str| content_type_for(std::path::Path::new(p));

        assert_eq!(ct("a.css"), Some("text/css"));
        assert_eq!(ct("a.JS"), Some("application/javascript"));
        assert_eq!(ct("photo.jpeg"), Some("image/jpeg"));
        assert_eq!(ct("icon.svg"), Some("image/svg+xml"));
        assert_eq!(ct("font.woff2"), Some("font/woff2"));
        assert_eq!(ct("notes.txt"), None);
        assert_eq!(ct("Makefile"), None);
    }

    #[test]
    fn test_validation_error_maps_to_400_with_details() {
        let mut fields = folio_common::FieldErrors::new();
        fields.insert("name".to_string(), "Name is required".to_string());

        let api: ApiError = Error::Validation(fields).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "Invalid profile data");
        assert_eq!(api.details.unwrap()["name"], "Name is required");
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let api: ApiError = Error::Io(io::Error::other("/srv/tmp/abc: disk full")).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal server error");

        let api: ApiError = Error::TemplateNotFound("x".to_string()).into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.message, "Template not found");
    }
}
