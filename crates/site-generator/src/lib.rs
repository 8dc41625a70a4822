//! Site Generator
//!
//! Turns a template and an untrusted profile into a static portfolio site.
//! Output lives in a per-request workspace and is either served as a
//! time-limited preview or streamed out as a zip archive.

pub mod catalog;
pub mod packager;
pub mod pipeline;
pub mod renderer;
pub mod sanitizer;
pub mod workspace;

pub use catalog::TemplateCatalog;
pub use pipeline::{Download, GeneratedSite, Preview, SiteGenerator};
pub use renderer::Renderer;
pub use workspace::{Workspace, WorkspaceManager, WorkspaceMode, WorkspaceTtls};
