//! Site renderer
//!
//! Binds a sanitized profile into a template's `index.hbs` and writes the
//! result, plus the template's static assets, into a workspace.
//!
//! Templates are rendered with a bare Handlebars registry: variable
//! substitution, `{{#each}}`/`{{#if}}` and the other built-in block helpers
//! only. No custom helpers are registered and every substituted value is
//! HTML-escaped, so profile data is never interpreted as markup.

use crate::catalog::TEMPLATE_SOURCE_FILE;
use crate::workspace::{Workspace, WorkspaceMode};
use folio_common::{Error, ProfileDocument, Result};
use handlebars::Handlebars;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of static files copied verbatim from a template
pub const ASSETS_DIR: &str = "assets";

/// File name of the rendered page
pub const OUTPUT_FILE: &str = "index.html";

/// Route prefix under which previews are served
pub const DEFAULT_PREVIEW_PREFIX: &str = "/preview";

pub struct Renderer {
    handlebars: Handlebars<'static>,
    preview_prefix: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_PREFIX)
    }
}

impl Renderer {
    pub fn new(preview_prefix: impl Into<String>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        Self {
            handlebars,
            preview_prefix: preview_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Render `template_dir` with `profile` into `workspace`.
    ///
    /// Returns the path of the written `index.html`. On error the workspace
    /// may be partially populated and must be discarded by the caller.
    pub fn render(
        &self,
        template_dir: &Path,
        profile: &ProfileDocument,
        workspace: &Workspace,
    ) -> Result<PathBuf> {
        let source_path = template_dir.join(TEMPLATE_SOURCE_FILE);
        if !source_path.is_file() {
            return Err(Error::TemplateInvalid(format!(
                "Template is missing {}",
                TEMPLATE_SOURCE_FILE
            )));
        }

        let assets_src = template_dir.join(ASSETS_DIR);
        if assets_src.is_dir() {
            let copied = copy_tree(&assets_src, &workspace.dir.join(ASSETS_DIR))?;
            debug!("Copied {} asset file(s) into workspace {}", copied, workspace.id);
        }

        let source = fs::read_to_string(&source_path)?;
        let mut html = self.bind(&source, profile)?;

        if workspace.mode == WorkspaceMode::Preview {
            let base = format!("{}/{}/{}/", self.preview_prefix, workspace.id, ASSETS_DIR);
            html = rewrite_asset_urls(&html, &base);
        }

        let output = workspace.dir.join(OUTPUT_FILE);
        fs::write(&output, html)?;

        debug!("Rendered {:?} site into workspace {}", workspace.mode, workspace.id);
        Ok(output)
    }

    /// Bind profile data into template source
    pub fn bind(&self, source: &str, profile: &ProfileDocument) -> Result<String> {
        self.handlebars
            .render_template(source, profile)
            .map_err(|e| Error::Render(e.to_string()))
    }
}

/// Point `href="assets/...` and `src="assets/...` references at `base`
pub fn rewrite_asset_urls(html: &str, base: &str) -> String {
    let prefix = format!("{}/", ASSETS_DIR);
    html.replace(&format!("href=\"{}", prefix), &format!("href=\"{}", base))
        .replace(&format!("src=\"{}", prefix), &format!("src=\"{}", base))
}

/// Copy a directory tree byte-for-byte. Symlinks are skipped.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());

        if file_type.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            warn!("Skipping non-regular asset: {}", entry.path().display());
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{WorkspaceManager, WorkspaceTtls};
    use folio_common::{Contact, Project};

    const TEMPLATE: &str = r#"<html><head><link rel="stylesheet" href="assets/style.css"></head>
<body><img src="assets/img/logo.png"><h1>{{name}}</h1><p>{{role}}</p>
<ul>{{#each skills}}<li>{{this}}</li>{{/each}}</ul>
{{#each projects}}<a href="{{link}}">{{title}}</a>{{/each}}
{{#if contact.email}}<a href="mailto:{{contact.email}}">mail</a>{{/if}}
</body></html>"#;

    fn install_template(root: &Path) -> PathBuf {
        let dir = root.join("template--simple");
        fs::create_dir_all(dir.join("assets/img")).unwrap();
        fs::write(dir.join(TEMPLATE_SOURCE_FILE), TEMPLATE).unwrap();
        fs::write(dir.join("assets/style.css"), "body { color: red; }").unwrap();
        fs::write(dir.join("assets/img/logo.png"), [0x89u8, b'P', b'N', b'G', 0, 255]).unwrap();
        dir
    }

    fn profile() -> ProfileDocument {
        ProfileDocument {
            name: "Jane Doe".to_string(),
            role: "Engineer".to_string(),
            skills: vec!["Rust".to_string(), "SQL".to_string()],
            projects: vec![Project {
                title: "Site".to_string(),
                description: String::new(),
                link: "https://example.com".to_string(),
            }],
            contact: Contact {
                email: "jane@example.com".to_string(),
                linkedin: String::new(),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_render_download_keeps_relative_assets() {
        let root = tempfile::tempdir().unwrap();
        let template = install_template(root.path());
        let manager = WorkspaceManager::new(root.path().join("tmp"), WorkspaceTtls::default());
        let ws = manager.allocate(WorkspaceMode::Download).await.unwrap();

        let output = Renderer::default().render(&template, &profile(), &ws).unwrap();
        let html = fs::read_to_string(output).unwrap();

        assert!(html.contains("<h1>Jane Doe</h1>"));
        assert!(html.contains("<li>Rust</li><li>SQL</li>"));
        assert!(html.contains(r#"<a href="https://example.com">Site</a>"#));
        assert!(html.contains("mailto:jane@example.com"));
        assert!(html.contains(r#"href="assets/style.css""#));
        assert_eq!(
            fs::read(ws.dir.join("assets/img/logo.png")).unwrap(),
            fs::read(template.join("assets/img/logo.png")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_render_preview_rewrites_assets() {
        let root = tempfile::tempdir().unwrap();
        let template = install_template(root.path());
        let manager = WorkspaceManager::new(root.path().join("tmp"), WorkspaceTtls::default());
        let ws = manager.allocate(WorkspaceMode::Preview).await.unwrap();

        let output = Renderer::default().render(&template, &profile(), &ws).unwrap();
        let html = fs::read_to_string(output).unwrap();

        let css = format!(r#"href="/preview/{}/assets/style.css""#, ws.id);
        let img = format!(r#"src="/preview/{}/assets/img/logo.png""#, ws.id);
        assert!(html.contains(&css));
        assert!(html.contains(&img));
        assert!(!html.contains(r#"href="assets/"#));
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let root = tempfile::tempdir().unwrap();
        let template = install_template(root.path());
        let manager = WorkspaceManager::new(root.path().join("tmp"), WorkspaceTtls::default());
        let renderer = Renderer::default();

        let a = manager.allocate(WorkspaceMode::Download).await.unwrap();
        let b = manager.allocate(WorkspaceMode::Download).await.unwrap();
        let first = fs::read(renderer.render(&template, &profile(), &a).unwrap()).unwrap();
        let second = fs::read(renderer.render(&template, &profile(), &b).unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_render_missing_source_is_template_invalid() {
        let root = tempfile::tempdir().unwrap();
        let template = root.path().join("hollow");
        fs::create_dir_all(template.join("assets")).unwrap();
        let manager = WorkspaceManager::new(root.path().join("tmp"), WorkspaceTtls::default());
        let ws = manager.allocate(WorkspaceMode::Download).await.unwrap();

        let result = Renderer::default().render(&template, &profile(), &ws);
        assert!(matches!(result, Err(Error::TemplateInvalid(_))));
    }

    #[test]
    fn test_bind_escapes_profile_markup() {
        let mut profile = profile();
        profile.name = "<script>alert('x')</script>{{role}}".to_string();

        let html = Renderer::default().bind("<h1>{{name}}</h1>", &profile).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("{{role}}"));
    }

    #[test]
    fn test_bind_reports_broken_templates() {
        let result = Renderer::default().bind("{{#each skills}}<li>", &profile());
        assert!(matches!(result, Err(Error::Render(_))));
    }

    #[test]
    fn test_rewrite_only_touches_asset_references() {
        let html = r#"<a href="assets/cv.pdf"></a><img src="assets/me.png"><a href="https://x.io/assets/a">"#;
        let out = rewrite_asset_urls(html, "/preview/abc/assets/");

        assert_eq!(
            out,
            r#"<a href="/preview/abc/assets/cv.pdf"></a><img src="/preview/abc/assets/me.png"><a href="https://x.io/assets/a">"#
        );
    }
}
