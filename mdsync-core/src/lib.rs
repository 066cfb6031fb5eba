//! mdsync core library — domain types, configuration, errors.
//!
//! - [`types`] — documents, rendered pages, commit metadata, output naming
//! - [`config`] — [`SyncConfig`] with default values and YAML loading
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ErrorMode, FailurePolicy, SyncConfig};
pub use error::ConfigError;
pub use types::{output_path, CommitInfo, Document, DocumentName, RenderedPage, OUTPUT_SUFFIX};
