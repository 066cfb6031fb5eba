//! Template context — the single value exposed to page templates.

use serde::Serialize;

use crate::error::RenderError;

/// Variable name the rendered HTML is bound to.
pub const CONTENT_VAR: &str = "content";

/// Rendering payload: the rendered HTML of the current document and nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext<'a> {
    pub content: &'a str,
}

impl<'a> PageContext<'a> {
    pub fn new(content: &'a str) -> Self {
        PageContext { content }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::TemplateExecute)
    }
}
