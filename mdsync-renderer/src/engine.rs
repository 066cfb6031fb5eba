//! Page template engine — [`PageTemplate`].
//!
//! Templates are Tera templates with autoescaping disabled and exactly one
//! variable in scope, `content`. The dot shorthand `{{.}}` (and `{{ . }}`,
//! `{{- . -}}`) is accepted as an alias for `{{ content }}` so existing page
//! shells keep working unchanged.
//!
//! Nothing is cached here: callers load a fresh [`PageTemplate`] each cycle so
//! edits to the template file take effect without a restart.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tera::Tera;

use crate::context::PageContext;
use crate::error::RenderError;

const PAGE_TEMPLATE: &str = "page";

static DOT_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(-?)\s*\.\s*(-?)\}\}").expect("dot placeholder pattern is valid")
});

static CONTENT_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{-?\s*content\b").expect("content placeholder pattern is valid")
});

/// Rewrite dot placeholders into the Tera variable form.
fn normalize_placeholders(text: &str) -> String {
    DOT_PLACEHOLDER
        .replace_all(text, "{{$1 content $2}}")
        .into_owned()
}

/// A parsed page template with a single content substitution point.
pub struct PageTemplate {
    tera: Tera,
}

impl std::fmt::Debug for PageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTemplate").finish_non_exhaustive()
    }
}

impl PageTemplate {
    /// Parse template text.
    ///
    /// Fails with [`RenderError::TemplateParse`] on a syntax error and
    /// [`RenderError::MissingPlaceholder`] when the text never references the
    /// content.
    pub fn parse(text: &str) -> Result<Self, RenderError> {
        let source = normalize_placeholders(text);
        if !CONTENT_PLACEHOLDER.is_match(&source) {
            return Err(RenderError::MissingPlaceholder);
        }

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(PAGE_TEMPLATE, &source)
            .map_err(RenderError::TemplateParse)?;
        Ok(PageTemplate { tera })
    }

    /// Read and parse the template file at `path`.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Substitute `html` into the template and return the final page bytes.
    pub fn apply(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let ctx = PageContext::new(html).to_tera_context()?;
        self.tera
            .render(PAGE_TEMPLATE, &ctx)
            .map(String::into_bytes)
            .map_err(RenderError::TemplateExecute)
    }
}

/// Parse `template_text` and apply it to `html` in one step.
pub fn apply_template(template_text: &str, html: &[u8]) -> Result<Vec<u8>, RenderError> {
    let html = String::from_utf8_lossy(html);
    PageTemplate::parse(template_text)?.apply(&html)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
