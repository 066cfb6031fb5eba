//! # mdsync-renderer
//!
//! Markdown → HTML conversion and the Tera page template that wraps it.
//!
//! ## Usage
//!
//! ```rust
//! use mdsync_renderer::{render_markdown, PageTemplate};
//!
//! let html = render_markdown(b"# Title");
//! let template = PageTemplate::parse("<body>{{.}}</body>").unwrap();
//! let page = template.apply(&html).unwrap();
//! assert_eq!(page, b"<body><h1>Title</h1>\n</body>");
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod markdown;

pub use context::PageContext;
pub use engine::{apply_template, PageTemplate};
pub use error::RenderError;
pub use markdown::render_markdown;
