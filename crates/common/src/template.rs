use serde::{Deserialize, Serialize};

/// Metadata describing one installed template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Directory name, matches `^[a-z0-9_-]+$`
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub description: String,

    /// URL path of the thumbnail image
    #[serde(rename = "thumbnail")]
    pub thumbnail_path: String,
}

impl TemplateDescriptor {
    /// Descriptor used when a template has no (readable) metadata file
    pub fn with_defaults(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            thumbnail_path: format!("/templates/{}/thumbnail.png", id),
        }
    }
}
