//! # mdsync-sync
//!
//! Directory conversion: every top-level document in the mirror is rendered,
//! wrapped in the page template, and written to the output directory.
//!
//! Call [`convert_all`] once per cycle. Per-document failures are recorded in
//! the returned [`ConvertReport`]; only a missing input directory or an
//! unusable output directory fail the whole call. [`diff_all`] previews the
//! changes a conversion would make without writing anything.

pub mod diff;
pub mod error;
pub mod pipeline;
pub mod writer;

pub use diff::{diff_all, DiffReport, FileDiff};
pub use error::{DocumentError, FailureStage, SyncError};
pub use pipeline::{convert_all, ConvertOptions, ConvertReport, DocumentOutcome, SkipReason};
pub use writer::WriteResult;
