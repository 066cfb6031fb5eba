//! Markdown → HTML.
//!
//! Pure and total: any byte sequence produces HTML. Invalid UTF-8 is decoded
//! lossily rather than rejected.

use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// Render Markdown bytes to an HTML fragment.
pub fn render_markdown(markup: &[u8]) -> String {
    let text = String::from_utf8_lossy(markup);
    let parser = Parser::new_ext(&text, options());
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
