//! Generation pipeline
//!
//! Runs one request end to end: validate, resolve the template, sanitize,
//! allocate a workspace, render, then hand the workspace to either the
//! preview path or the archive path. Any failure after allocation destroys
//! the workspace before the error is returned.

use crate::catalog::TemplateCatalog;
use crate::packager::{self, ArchiveStream};
use crate::renderer::{Renderer, OUTPUT_FILE};
use crate::sanitizer;
use crate::workspace::{Workspace, WorkspaceManager, WorkspaceMode};
use bytes::Bytes;
use folio_common::{Error, ProfileDocument, Result, TemplateDescriptor};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

/// A rendered site sitting in its workspace
#[derive(Debug)]
pub struct GeneratedSite {
    pub workspace: Workspace,
    pub profile: ProfileDocument,
}

/// A preview that can be fetched until it expires
#[derive(Debug, Clone)]
pub struct Preview {
    pub id: String,
    pub url: String,
}

/// An archive whose first bytes have already been produced
pub struct Download {
    /// Suggested file name, e.g. `Jane_Doe.zip`
    pub file_name: String,

    pub first_chunk: Bytes,

    /// Remaining archive bytes; an `Err` item means packaging failed midway
    pub rest: ReceiverStream<io::Result<Bytes>>,
}

#[derive(Clone)]
pub struct SiteGenerator {
    catalog: TemplateCatalog,
    renderer: Arc<Renderer>,
    workspaces: Arc<WorkspaceManager>,
}

impl SiteGenerator {
    pub fn new(
        catalog: TemplateCatalog,
        renderer: Renderer,
        workspaces: Arc<WorkspaceManager>,
    ) -> Self {
        Self {
            catalog,
            renderer: Arc::new(renderer),
            workspaces,
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn workspaces(&self) -> &Arc<WorkspaceManager> {
        &self.workspaces
    }

    /// List installed templates without blocking the runtime
    pub async fn list_templates(&self) -> Result<Vec<TemplateDescriptor>> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.list())
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
    }

    /// Validate and sanitize `raw_profile`, then render `template_id` into a
    /// new workspace of the given mode.
    ///
    /// Nothing touches the filesystem until the template id has passed the
    /// catalog's filter and the profile has validated.
    pub async fn generate(
        &self,
        template_id: &str,
        raw_profile: &Value,
        mode: WorkspaceMode,
    ) -> Result<GeneratedSite> {
        let validation = sanitizer::validate(raw_profile);
        if !validation.is_valid {
            return Err(Error::Validation(validation.field_errors));
        }

        let catalog = self.catalog.clone();
        let id = template_id.to_string();
        let template_dir = tokio::task::spawn_blocking(move || catalog.resolve(&id))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))??;
        let profile = sanitizer::sanitize(raw_profile);

        let workspace = self.workspaces.allocate(mode).await?;

        let renderer = self.renderer.clone();
        let render_profile = profile.clone();
        let render_workspace = workspace.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&template_dir, &render_profile, &render_workspace)
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))
        .and_then(|result| result);

        if let Err(e) = rendered {
            error!("Rendering {} into workspace {} failed: {}", template_id, workspace.id, e);
            self.workspaces.destroy_now(&workspace).await;
            return Err(e);
        }

        info!("Generated {:?} site from template {} in workspace {}", mode, template_id, workspace.id);
        Ok(GeneratedSite { workspace, profile })
    }

    /// Make a rendered preview servable for the preview TTL
    pub async fn publish_preview(&self, site: GeneratedSite, route_prefix: &str) -> Result<Preview> {
        let mut workspace = site.workspace;
        let ttl = self.workspaces.ttls().for_mode(WorkspaceMode::Preview);

        if !self.workspaces.schedule_expiry(&mut workspace, ttl).await {
            return Err(Error::PreviewExpired);
        }

        let id = workspace.id.to_string();
        Ok(Preview {
            url: format!("{}/{}", route_prefix.trim_end_matches('/'), id),
            id,
        })
    }

    /// Start streaming a rendered site as a zip archive.
    ///
    /// Returns only once the workspace has been checked and the first chunk
    /// of the archive exists, so every failure up to that point is still an
    /// ordinary error. The workspace is scheduled for deletion when
    /// packaging completes, or destroyed at once if packaging fails or the
    /// receiver goes away.
    pub async fn start_download(&self, site: GeneratedSite) -> Result<Download> {
        let workspace = site.workspace;
        let file_name = packager::download_file_name(&site.profile.name);

        let dir = workspace.dir.clone();
        let entries = tokio::task::spawn_blocking(move || -> Result<_> {
            if !dir.join(OUTPUT_FILE).is_file() {
                return Err(Error::Archive(format!("Workspace is missing {}", OUTPUT_FILE)));
            }
            packager::collect_entries(&dir)
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))
        .and_then(|result| result);

        let entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                error!("Workspace {} cannot be packaged: {}", workspace.id, e);
                self.workspaces.destroy_now(&workspace).await;
                return Err(e);
            }
        };

        if !self.workspaces.begin_streaming(&workspace).await {
            return Err(Error::Archive("Workspace was reclaimed before packaging".to_string()));
        }

        let ArchiveStream { mut chunks, task } = packager::spawn_archive_stream(entries);

        let workspaces = self.workspaces.clone();
        let mut finished = workspace.clone();
        tokio::spawn(async move {
            let outcome = task
                .await
                .map_err(|e| Error::Io(io::Error::other(e)))
                .and_then(|result| result);

            match outcome {
                Ok(files) => {
                    info!("Streamed {} file(s) from workspace {}", files, finished.id);
                    let ttl = workspaces.ttls().for_mode(WorkspaceMode::Download);
                    workspaces.schedule_expiry(&mut finished, ttl).await;
                }
                Err(e) => {
                    error!("Packaging workspace {} failed: {}", finished.id, e);
                    workspaces.destroy_now(&finished).await;
                }
            }
        });

        match chunks.recv().await {
            Some(Ok(first_chunk)) => Ok(Download {
                file_name,
                first_chunk,
                rest: ReceiverStream::new(chunks),
            }),
            Some(Err(e)) => Err(Error::Archive(e.to_string())),
            None => Err(Error::Archive("Archive produced no data".to_string())),
        }
    }
}
