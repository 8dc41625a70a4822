//! Profile sanitizer
//!
//! Two passes over untrusted profile JSON:
//! - `validate` reports every offending field at once
//! - `sanitize` coerces whatever it is given into a bounded `ProfileDocument`
//!   and never fails

use folio_common::{Contact, FieldErrors, ProfileDocument, Project, ValidationResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

/// Maximum length of any string field, in characters
pub const MAX_FIELD_CHARS: usize = 1000;

/// Maximum number of skills kept
pub const MAX_SKILLS: usize = 20;

/// Maximum number of projects kept
pub const MAX_PROJECTS: usize = 10;

/// Maximum size of an embedded profile image data URI
pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Check a raw profile, collecting one message per offending field.
///
/// All checks run even when earlier ones fail.
pub fn validate(raw: &Value) -> ValidationResult {
    let mut errors = FieldErrors::new();

    let Some(profile) = raw.as_object() else {
        errors.insert("profile".to_string(), "Invalid profile data".to_string());
        return ValidationResult::from_errors(errors);
    };

    if !has_text(profile.get("name")) {
        errors.insert("name".to_string(), "Name is required".to_string());
    }
    if !has_text(profile.get("role")) {
        errors.insert("role".to_string(), "Role is required".to_string());
    }

    if matches!(profile.get("skills"), Some(v) if !v.is_null() && !v.is_array()) {
        errors.insert("skills".to_string(), "Skills must be an array".to_string());
    }
    if matches!(profile.get("projects"), Some(v) if !v.is_null() && !v.is_array()) {
        errors.insert("projects".to_string(), "Projects must be an array".to_string());
    }

    let contact = profile.get("contact");
    let email = text(contact.and_then(|c| c.get("email")));
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.insert("email".to_string(), "Invalid email format".to_string());
    }
    let linkedin = text(contact.and_then(|c| c.get("linkedin")));
    if !is_valid_url(linkedin) {
        errors.insert("linkedin".to_string(), "Invalid LinkedIn URL".to_string());
    }

    if let Some(projects) = profile.get("projects").and_then(Value::as_array) {
        for (index, project) in projects.iter().enumerate() {
            let link = text(project.get("link"));
            if !is_valid_url(link) {
                errors.insert(
                    format!("project_{}_link", index),
                    format!("Invalid URL for project: {}", text(project.get("title"))),
                );
            }
        }
    }

    ValidationResult::from_errors(errors)
}

/// Coerce a raw profile into a bounded `ProfileDocument`.
///
/// Missing or wrong-typed fields become empty values.
pub fn sanitize(raw: &Value) -> ProfileDocument {
    let contact = raw.get("contact");

    let skills = match raw.get("skills").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|s| sanitize_string(Some(s)))
            .filter(|s| !s.is_empty())
            .take(MAX_SKILLS)
            .collect(),
        None => Vec::new(),
    };

    let projects = match raw.get("projects").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|p| Project {
                title: sanitize_string(p.get("title")),
                description: sanitize_string(p.get("description")),
                link: sanitize_string(p.get("link")),
            })
            .filter(|p| !p.is_empty())
            .take(MAX_PROJECTS)
            .collect(),
        None => Vec::new(),
    };

    ProfileDocument {
        name: sanitize_string(raw.get("name")),
        role: sanitize_string(raw.get("role")),
        bio: sanitize_string(raw.get("bio")),
        profile_image: sanitize_image(
            raw.get("profileImage")
                .or_else(|| raw.get("profileImageDataUri")),
        ),
        skills,
        projects,
        contact: Contact {
            email: sanitize_string(contact.and_then(|c| c.get("email"))),
            linkedin: sanitize_string(contact.and_then(|c| c.get("linkedin"))),
        },
    }
}

/// Strip control characters (other than whitespace), trim, and clip to
/// `MAX_FIELD_CHARS`. Non-strings become the empty string.
pub fn sanitize_string(value: Option<&Value>) -> String {
    let Some(s) = value.and_then(Value::as_str) else {
        return String::new();
    };

    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    cleaned
        .trim()
        .chars()
        .take(MAX_FIELD_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn sanitize_image(value: Option<&Value>) -> String {
    let Some(raw) = value.and_then(Value::as_str) else {
        return String::new();
    };

    let uri: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    if uri.starts_with("data:image/") && uri.len() <= MAX_PROFILE_IMAGE_BYTES {
        uri
    } else {
        String::new()
    }
}

fn text(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).map(str::trim).unwrap_or("")
}

fn has_text(value: Option<&Value>) -> bool {
    !text(value).is_empty()
}

/// Empty is valid; anything else must be an absolute http(s) URL
fn is_valid_url(s: &str) -> bool {
    s.is_empty()
        || Url::parse(s).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
