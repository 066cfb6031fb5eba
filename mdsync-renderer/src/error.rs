//! Error types for mdsync-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from page templating.
///
/// Markdown rendering itself never fails.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("template io error at {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tera rejected the template text.
    #[error("template parse error: {0}")]
    TemplateParse(#[source] tera::Error),

    /// The template parsed but has nowhere to put the page content.
    #[error("template has no content placeholder; add `{{{{ content }}}}` or `{{{{.}}}}`")]
    MissingPlaceholder,

    /// Tera failed while substituting the content.
    #[error("template execution error: {0}")]
    TemplateExecute(#[source] tera::Error),
}
