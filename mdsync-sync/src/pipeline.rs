//! Convert-all pipeline shared by the CLI and the sync loop.
//!
//! Read → render → template → write, once per top-level entry of the input
//! directory. Document-level failures become [`DocumentOutcome::Failed`] and
//! the batch continues; only a missing input directory or an uncreatable
//! output directory abort the call.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use mdsync_core::{output_path, Document, DocumentName, RenderedPage};
use mdsync_renderer::{render_markdown, PageTemplate, RenderError};

use crate::error::{io_err, DocumentError, FailureStage, SyncError};
use crate::writer::{atomic_write, WriteResult};

/// Knobs for a conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Threads in the conversion pool; `1` converts sequentially.
    pub workers: usize,
    /// Render everything but write nothing.
    pub dry_run: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            workers: 1,
            dry_run: false,
        }
    }
}

/// Why an entry was not converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Subdirectories are not descended into.
    Directory,
}

/// Per-document result of a conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Written {
        name: DocumentName,
        path: PathBuf,
    },
    WouldWrite {
        name: DocumentName,
        path: PathBuf,
    },
    Skipped {
        name: DocumentName,
        reason: SkipReason,
    },
    Failed {
        name: DocumentName,
        stage: FailureStage,
        error: String,
    },
}

impl DocumentOutcome {
    pub fn name(&self) -> &DocumentName {
        match self {
            DocumentOutcome::Written { name, .. }
            | DocumentOutcome::WouldWrite { name, .. }
            | DocumentOutcome::Skipped { name, .. }
            | DocumentOutcome::Failed { name, .. } => name,
        }
    }

    fn failed(name: DocumentName, err: &DocumentError) -> Self {
        DocumentOutcome::Failed {
            name,
            stage: err.stage(),
            error: err.to_string(),
        }
    }
}

/// Summary of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertReport {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Set when the template could not be loaded for this run; every
    /// document then fails at the template stage.
    pub template_error: Option<String>,
    /// One entry per directory entry, in file-name order.
    pub outcomes: Vec<DocumentOutcome>,
}

impl ConvertReport {
    /// Pages written, or that would be written under `--dry-run`.
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    DocumentOutcome::Written { .. } | DocumentOutcome::WouldWrite { .. }
                )
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Failed { .. }))
            .count()
    }

    /// No document failed and the template loaded.
    pub fn is_clean(&self) -> bool {
        self.template_error.is_none() && self.failed() == 0
    }
}

/// A top-level entry of the input directory.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub path: PathBuf,
    pub file_name: OsString,
    pub is_dir: bool,
}

impl Entry {
    pub fn name(&self) -> DocumentName {
        DocumentName::from(self.file_name.as_os_str())
    }
}

/// Version-control metadata of the mirror; never a document.
const GIT_DIR: &str = ".git";

/// List the direct entries of `input_dir`, sorted by file name, leaving out
/// the mirror's `.git` directory.
///
/// Fails with [`SyncError::DirectoryMissing`] before touching anything else.
pub(crate) fn list_entries(input_dir: &Path) -> Result<Vec<Entry>, SyncError> {
    if !input_dir.is_dir() {
        return Err(SyncError::DirectoryMissing {
            path: input_dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(input_dir).map_err(|e| io_err(input_dir, e))? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(dir = %input_dir.display(), error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_name() == GIT_DIR {
            continue;
        }
        let path = entry.path();
        // Follows symlinks; a dangling link is not a directory and fails at read time.
        let is_dir = std::fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
        entries.push(Entry {
            path,
            file_name: entry.file_name(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Read, render and template one entry. Never writes.
pub(crate) fn render_entry(
    entry: &Entry,
    output_dir: &Path,
    template: &Result<PageTemplate, RenderError>,
) -> Result<RenderedPage, DocumentError> {
    let doc = Document::read(&entry.path).map_err(|source| DocumentError::Read {
        path: entry.path.clone(),
        source,
    })?;
    let html = render_markdown(&doc.bytes);
    let template = template
        .as_ref()
        .map_err(|e| DocumentError::Template(e.to_string()))?;
    let content = template
        .apply(&html)
        .map_err(|e| DocumentError::Template(e.to_string()))?;
    Ok(RenderedPage {
        name: doc.name,
        output_path: output_path(output_dir, &entry.file_name),
        content,
    })
}

fn convert_entry(
    entry: &Entry,
    output_dir: &Path,
    template: &Result<PageTemplate, RenderError>,
    dry_run: bool,
) -> DocumentOutcome {
    let name = entry.name();
    if entry.is_dir {
        tracing::debug!(document = %name, "skipping subdirectory");
        return DocumentOutcome::Skipped {
            name,
            reason: SkipReason::Directory,
        };
    }

    let result = render_entry(entry, output_dir, template)
        .and_then(|page| atomic_write(&page.output_path, &page.content, dry_run));

    match result {
        Ok(WriteResult::Written { path }) => {
            tracing::info!(document = %name, output = %path.display(), "created HTML");
            DocumentOutcome::Written { name, path }
        }
        Ok(WriteResult::WouldWrite { path }) => {
            tracing::info!(document = %name, output = %path.display(), "[dry-run] would create HTML");
            DocumentOutcome::WouldWrite { name, path }
        }
        Err(err) => {
            match err.stage() {
                FailureStage::Read => {
                    tracing::warn!(document = %name, error = %err, "skipping unreadable document")
                }
                _ => tracing::error!(document = %name, error = %err, "document failed; continuing"),
            }
            DocumentOutcome::failed(name, &err)
        }
    }
}

/// Convert every top-level document in `input_dir` into `output_dir`.
///
/// The template at `template_path` is loaded fresh on every call. A broken
/// template is reported in [`ConvertReport::template_error`] and fails each
/// document without writing; the call itself still succeeds.
pub fn convert_all(
    input_dir: &Path,
    output_dir: &Path,
    template_path: &Path,
    options: &ConvertOptions,
) -> Result<ConvertReport, SyncError> {
    let entries = list_entries(input_dir)?;

    if !options.dry_run {
        std::fs::create_dir_all(output_dir).map_err(|source| SyncError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
    }

    let template = PageTemplate::load(template_path);
    let template_error = match &template {
        Ok(_) => None,
        Err(err) => {
            tracing::error!(template = %template_path.display(), error = %err, "page template unusable this cycle");
            Some(err.to_string())
        }
    };

    let outcomes: Vec<DocumentOutcome> = if options.workers <= 1 || entries.len() <= 1 {
        entries
            .iter()
            .map(|entry| convert_entry(entry, output_dir, &template, options.dry_run))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("mdsync-convert-{i}"))
            .build()
            .map_err(|e| SyncError::Pool(e.to_string()))?;
        // Indexed collect keeps listing order regardless of completion order.
        pool.install(|| {
            entries
                .par_iter()
                .map(|entry| convert_entry(entry, output_dir, &template, options.dry_run))
                .collect()
        })
    };

    let report = ConvertReport {
        input_dir: input_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        template_error,
        outcomes,
    };
    tracing::info!(
        written = report.written(),
        skipped = report.skipped(),
        failed = report.failed(),
        "conversion finished",
    );
    Ok(report)
}
