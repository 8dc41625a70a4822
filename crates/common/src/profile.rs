//! Profile data model
//!
//! `ProfileDocument` is the sanitized form of a user's profile. It is the only
//! shape the renderer accepts; raw client JSON is turned into it by the
//! sanitizer in `site-generator`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to human-readable message, ordered by field name
pub type FieldErrors = BTreeMap<String, String>;

/// Sanitized profile bound into a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub name: String,

    pub role: String,

    pub bio: String,

    /// `data:image/...` URI, empty when absent or rejected
    pub profile_image: String,

    pub skills: Vec<String>,

    pub projects: Vec<Project>,

    pub contact: Contact,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub link: String,
}

impl Project {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.link.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub linkedin: String,
}

/// Outcome of validating a raw profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,

    /// One message per offending field
    pub field_errors: FieldErrors,
}

impl ValidationResult {
    pub fn from_errors(field_errors: FieldErrors) -> Self {
        Self {
            is_valid: field_errors.is_empty(),
            field_errors,
        }
    }
}
