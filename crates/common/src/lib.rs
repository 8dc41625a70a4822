pub mod error;
pub mod profile;
pub mod template;

pub use error::{Error, Result};
pub use profile::{Contact, FieldErrors, ProfileDocument, Project, ValidationResult};
pub use template::TemplateDescriptor;
