//! Dry-run unified diff support for `mdsync diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use mdsync_core::DocumentName;
use mdsync_renderer::PageTemplate;

use crate::error::{io_err, SyncError};
use crate::pipeline::{list_entries, render_entry};

/// A single page diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub name: DocumentName,
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diff result for a whole input directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub diffs: Vec<FileDiff>,
    pub unchanged: usize,
    /// Documents that could not be read or rendered; they would fail on convert too.
    pub failed: Vec<DocumentName>,
}

/// Render what `convert_all` would generate and compare it to the pages
/// currently in `output_dir`.
///
/// No files are written. Unlike conversion, an unusable template is an error
/// here since there is nothing meaningful to compare.
pub fn diff_all(
    input_dir: &Path,
    output_dir: &Path,
    template_path: &Path,
) -> Result<DiffReport, SyncError> {
    let entries = list_entries(input_dir)?;
    let template = Ok(PageTemplate::load(template_path)?);

    let mut report = DiffReport::default();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        let page = match render_entry(entry, output_dir, &template) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(document = %entry.name(), error = %err, "cannot render document for diff");
                report.failed.push(entry.name());
                continue;
            }
        };

        let existing = read_existing_or_empty(&page.output_path)?;
        if existing == page.content {
            report.unchanged += 1;
            continue;
        }

        let old = String::from_utf8_lossy(&existing);
        let new = String::from_utf8_lossy(&page.content);
        let file_name = page
            .output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| page.name.0.clone());
        let old_header = format!("a/{file_name}");
        let new_header = format!("b/{file_name}");
        let unified = TextDiff::from_lines(old.as_ref(), new.as_ref())
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        report.diffs.push(FileDiff {
            name: page.name,
            path: page.output_path,
            unified_diff: unified,
        });
    }

    Ok(report)
}

fn read_existing_or_empty(path: &Path) -> Result<Vec<u8>, SyncError> {
    match std::fs::read(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::{convert_all, ConvertOptions};

    use super::*;

    struct Fixture {
        _root: TempDir,
        input: PathBuf,
        output: PathBuf,
        template: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().expect("root");
        let input = root.path().join("input");
        let output = root.path().join("output");
        let template = root.path().join("template.html");
        fs::create_dir_all(&input).unwrap();
        fs::write(&template, "<body>{{.}}</body>").unwrap();
        fs::write(input.join("a.md"), "# Title").unwrap();
        Fixture {
            _root: root,
            input,
            output,
            template,
        }
    }

    #[test]
    fn no_diffs_after_clean_convert() {
        let fx = fixture();
        convert_all(&fx.input, &fx.output, &fx.template, &ConvertOptions::default())
            .expect("convert");

        let diff = diff_all(&fx.input, &fx.output, &fx.template).expect("diff");
        assert!(diff.diffs.is_empty(), "converted directory should have no diff");
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn missing_page_produces_unified_diff() {
        let fx = fixture();
        let diff = diff_all(&fx.input, &fx.output, &fx.template).expect("diff");
        assert_eq!(diff.diffs.len(), 1);
        let page = &diff.diffs[0];
        assert!(page.unified_diff.contains("--- a/a.md.html"));
        assert!(page.unified_diff.contains("+++ b/a.md.html"));
        assert!(page.unified_diff.contains("+<body><h1>Title</h1>"));
        assert!(!fx.output.exists(), "diff must not create the output directory");
    }

    #[test]
    fn source_edit_shows_up_in_diff() {
        let fx = fixture();
        convert_all(&fx.input, &fx.output, &fx.template, &ConvertOptions::default())
            .expect("convert");
        fs::write(fx.input.join("a.md"), "# Renamed").unwrap();

        let diff = diff_all(&fx.input, &fx.output, &fx.template).expect("diff");
        let page = &diff.diffs[0];
        assert!(page.unified_diff.contains("-<body><h1>Title</h1>"));
        assert!(page.unified_diff.contains("+<body><h1>Renamed</h1>"));
        assert!(page.unified_diff.contains("@@"));
    }

    #[test]
    fn broken_template_is_an_error() {
        let fx = fixture();
        fs::write(&fx.template, "<body></body>").unwrap();
        assert!(matches!(
            diff_all(&fx.input, &fx.output, &fx.template),
            Err(SyncError::Template(_))
        ));
    }
}
