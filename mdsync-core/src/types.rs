//! Domain types for the mdsync pipeline.
//!
//! All path fields use `PathBuf`; document names are kept separately so that
//! output naming never has to round-trip through a lossy string.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix appended to every document name to form its output file name.
pub const OUTPUT_SUFFIX: &str = ".html";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The stable name of a document: its file name within the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentName(pub String);

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DocumentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<&OsStr> for DocumentName {
    fn from(s: &OsStr) -> Self {
        Self(s.to_string_lossy().into_owned())
    }
}

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// `<output_dir>/<file_name>.html`. Pure, no I/O.
///
/// The suffix is appended to the full file name; an existing extension is
/// kept (`a.md` → `a.md.html`).
pub fn output_path(output_dir: &Path, file_name: &OsStr) -> PathBuf {
    let mut name = OsString::from(file_name);
    name.push(OUTPUT_SUFFIX);
    output_dir.join(name)
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One source markup file read from the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: DocumentName,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Last modification time reported by the filesystem. Recorded only;
    /// every document is reprocessed every cycle.
    pub modified: Option<DateTime<Utc>>,
}

impl Document {
    /// Read the document at `path`.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let name = path
            .file_name()
            .map(DocumentName::from)
            .unwrap_or_else(|| DocumentName::from(path.to_string_lossy().into_owned()));
        Ok(Document {
            name,
            path: path.to_path_buf(),
            bytes,
            modified,
        })
    }
}

/// Final page bytes for one document, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub name: DocumentName,
    pub output_path: PathBuf,
    pub content: Vec<u8>,
}

/// Head commit of the local mirror after a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub author: String,
    pub email: String,
    pub committed_at: DateTime<Utc>,
    pub summary: String,
}

impl CommitInfo {
    /// First seven characters of the commit id.
    pub fn short_id(&self) -> &str {
        self.id.get(..7).unwrap_or(&self.id)
    }
}

impl fmt::Display for CommitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} <{}> {} {}",
            self.short_id(),
            self.author,
            self.email,
            self.committed_at.to_rfc3339(),
            self.summary
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("a.md", "a.md.html")]
    #[case("README", "README.html")]
    #[case("release.notes.v2.md", "release.notes.v2.md.html")]
    #[case(".hidden", ".hidden.html")]
    #[case("page.html", "page.html.html")]
    fn output_path_appends_suffix(#[case] name: &str, #[case] expected: &str) {
        let out = PathBuf::from("/srv/output");
        assert_eq!(
            output_path(&out, OsStr::new(name)),
            PathBuf::from("/srv/output").join(expected)
        );
    }

    #[test]
    fn read_document_captures_name_bytes_and_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("intro.md");
        std::fs::write(&path, "# Intro\n").unwrap();

        let doc = Document::read(&path).unwrap();
        assert_eq!(doc.name, DocumentName::from("intro.md"));
        assert_eq!(doc.bytes, b"# Intro\n");
        assert!(doc.modified.is_some());
    }

    #[test]
    fn read_missing_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Document::read(&tmp.path().join("gone.md")).is_err());
    }

    #[test]
    fn commit_display_uses_short_id() {
        let commit = CommitInfo {
            id: "0123456789abcdef".to_string(),
            author: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            committed_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            summary: "Add docs".to_string(),
        };
        let line = commit.to_string();
        assert!(line.starts_with("0123456 Ada <ada@example.com>"));
        assert!(line.ends_with("Add docs"));
    }

    #[test]
    fn short_id_of_short_hash_is_whole_hash() {
        let commit = CommitInfo {
            id: "abc".to_string(),
            author: String::new(),
            email: String::new(),
            committed_at: Utc::now(),
            summary: String::new(),
        };
        assert_eq!(commit.short_id(), "abc");
    }
}
