use crate::profile::FieldErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid profile data")]
    Validation(FieldErrors),

    #[error("Template not found")]
    TemplateNotFound(String),

    #[error("Template is invalid: {0}")]
    TemplateInvalid(String),

    #[error("Preview not found or expired")]
    PreviewExpired,

    #[error("Render error: {0}")]
    Render(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::TemplateNotFound(_) | Error::PreviewExpired
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_facing_messages_hide_details() {
        let err = Error::TemplateNotFound("../../etc".to_string());
        assert_eq!(err.to_string(), "Template not found");
        assert!(err.is_client_error());

        let err = Error::Io(std::io::Error::other("disk full"));
        assert!(!err.is_client_error());
    }
}
