//! Template catalog
//!
//! Read-through view over the template root directory. Every query rescans
//! the filesystem, so templates added while the service runs show up on the
//! next request.

use folio_common::{Error, Result, TemplateDescriptor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Render source every template must provide
pub const TEMPLATE_SOURCE_FILE: &str = "index.hbs";

/// Optional per-template metadata file
pub const METADATA_FILE: &str = "meta.json";

/// Shape of `meta.json`; every field is optional
#[derive(Debug, Default, Deserialize)]
struct TemplateMetadata {
    name: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
}

/// Returns true if `id` only contains `[A-Za-z0-9_-]` and is non-empty.
///
/// Every template id coming from a client goes through this before it is
/// joined onto a filesystem path.
pub fn is_safe_template_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Catalog of installed templates
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    root: PathBuf,
}

impl TemplateCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every installed template, sorted by id.
    ///
    /// A missing root yields an empty list. Unreadable or malformed metadata
    /// falls back to defaults for that template only.
    pub fn list(&self) -> Result<Vec<TemplateDescriptor>> {
        if !self.root.exists() {
            debug!("Template root does not exist: {}", self.root.display());
            return Ok(Vec::new());
        }

        let mut templates = Vec::new();
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(id) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_listable_id(id) {
                debug!("Skipping template directory with unsupported name: {}", id);
                continue;
            }

            templates.push(load_descriptor(id, &path));
        }

        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }

    /// Resolve a client-supplied template id to its directory.
    ///
    /// Fails with `TemplateNotFound` when the id contains characters outside
    /// the allowed set, when no such directory exists, or when the directory
    /// has no render source.
    pub fn resolve(&self, template_id: &str) -> Result<PathBuf> {
        if !is_safe_template_id(template_id) {
            warn!("Rejected unsafe template id: {:?}", template_id);
            return Err(Error::TemplateNotFound(template_id.to_string()));
        }

        let dir = self.root.join(template_id);
        if !dir.is_dir() || !dir.join(TEMPLATE_SOURCE_FILE).is_file() {
            debug!("Template not installed: {}", template_id);
            return Err(Error::TemplateNotFound(template_id.to_string()));
        }

        Ok(dir)
    }
}

/// Directory names the catalog advertises: `^[a-z0-9_-]+$`
fn is_listable_id(id: &str) -> bool {
    is_safe_template_id(id) && !id.chars().any(|c| c.is_ascii_uppercase())
}

fn load_descriptor(id: &str, dir: &Path) -> TemplateDescriptor {
    let mut descriptor = TemplateDescriptor::with_defaults(id);

    let meta_path = dir.join(METADATA_FILE);
    if !meta_path.exists() {
        return descriptor;
    }

    let meta = match std::fs::read_to_string(&meta_path)
        .map_err(Error::from)
        .and_then(|content| serde_json::from_str::<TemplateMetadata>(&content).map_err(Error::from))
    {
        Ok(meta) => meta,
        Err(e) => {
            warn!("Ignoring metadata for template {}: {}", id, e);
            return descriptor;
        }
    };

    if let Some(name) = meta.name {
        descriptor.name = name;
    }
    if let Some(description) = meta.description {
        descriptor.description = description;
    }
    if let Some(thumbnail) = meta.thumbnail {
        descriptor.thumbnail_path = thumbnail;
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn install(root: &Path, id: &str, meta: Option<&str>) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(TEMPLATE_SOURCE_FILE), "<h1>{{name}}</h1>").unwrap();
        if let Some(meta) = meta {
            fs::write(dir.join(METADATA_FILE), meta).unwrap();
        }
    }

    #[test]
    fn test_list_reads_metadata_and_defaults() {
        let root = tempfile::tempdir().unwrap();
        install(
            root.path(),
            "modern",
            Some(r#"{"name": "Modern", "description": "Clean layout"}"#),
        );
        install(root.path(), "plain", None);
        install(root.path(), "broken", Some("{ not json"));
        fs::write(root.path().join("README.md"), "not a template").unwrap();

        let templates = TemplateCatalog::new(root.path()).list().unwrap();
        let ids: Vec<_> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["broken", "modern", "plain"]);

        assert_eq!(templates[0], TemplateDescriptor::with_defaults("broken"));
        assert_eq!(templates[1].name, "Modern");
        assert_eq!(templates[1].description, "Clean layout");
        assert_eq!(templates[1].thumbnail_path, "/templates/modern/thumbnail.png");
        assert_eq!(templates[2].name, "plain");
    }

    #[test]
    fn test_list_picks_up_new_templates() {
        let root = tempfile::tempdir().unwrap();
        let catalog = TemplateCatalog::new(root.path());
        assert!(catalog.list().unwrap().is_empty());

        install(root.path(), "late", None);
        assert_eq!(catalog.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let catalog = TemplateCatalog::new("/nonexistent/template/root");
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_rejects_unsafe_ids() {
        let root = tempfile::tempdir().unwrap();
        install(root.path(), "modern", None);
        let catalog = TemplateCatalog::new(root.path().join("inner"));

        for id in ["../modern", "..", "a/b", "modern.hbs", "", "tem plate", "%2e%2e"] {
            assert!(
                matches!(catalog.resolve(id), Err(Error::TemplateNotFound(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_resolve_requires_render_source() {
        let root = tempfile::tempdir().unwrap();
        install(root.path(), "modern", None);
        fs::create_dir_all(root.path().join("empty")).unwrap();
        let catalog = TemplateCatalog::new(root.path());

        assert_eq!(catalog.resolve("modern").unwrap(), root.path().join("modern"));
        assert!(matches!(catalog.resolve("empty"), Err(Error::TemplateNotFound(_))));
        assert!(matches!(catalog.resolve("missing"), Err(Error::TemplateNotFound(_))));
    }
}
