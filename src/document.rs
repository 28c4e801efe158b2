//! The markdown document being edited and its file name.

use crate::sink::DEFAULT_BASE_NAME;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in sample shown when nothing has been opened.
pub const SAMPLE_MARKDOWN: &str = include_str!("../assets/sample.md");

/// Extensions accepted by [`Document::open`].
pub const ACCEPTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub markdown: String,
    /// Base name for exports, without extension
    pub filename: String,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            markdown: SAMPLE_MARKDOWN.to_string(),
            filename: DEFAULT_BASE_NAME.to_string(),
        }
    }
}

impl Document {
    pub fn new(markdown: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            filename: filename.into(),
        }
    }

    /// Read a markdown file; its stem becomes the document's file name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::Other(format!(
                "{} is not a markdown file (expected .md, .markdown or .txt)",
                path.display()
            )));
        }
        let markdown = fs::read_to_string(path)?;
        let filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { markdown, filename })
    }

    /// Base name to export under; blank names fall back to `document`.
    pub fn base_name(&self) -> &str {
        let trimmed = self.filename.trim();
        if trimmed.is_empty() {
            DEFAULT_BASE_NAME
        } else {
            trimmed
        }
    }

    /// Write the markdown source to `<dir>/<base name>.md`.
    pub fn save_markdown(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.md", self.base_name()));
        fs::write(&path, &self.markdown)
            .map_err(|e| Error::PersistenceFailure(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_is_the_sample() {
        let doc = Document::default();
        assert_eq!(doc.filename, "document");
        assert!(doc.markdown.starts_with("# "));
        assert!(doc.markdown.contains("| Day |"));
    }

    #[test]
    fn open_takes_file_stem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meeting.notes.md");
        fs::write(&path, "# Notes").unwrap();
        let doc = Document::open(&path).unwrap();
        assert_eq!(doc.filename, "meeting.notes");
        assert_eq!(doc.markdown, "# Notes");
    }

    #[test]
    fn open_rejects_other_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, [0u8; 4]).unwrap();
        assert!(Document::open(&path).is_err());
    }

    #[test]
    fn save_uses_document_for_blank_name() {
        let dir = tempdir().unwrap();
        let doc = Document::new("text", "  ");
        let path = doc.save_markdown(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "document.md");
        assert_eq!(fs::read_to_string(path).unwrap(), "text");
    }
}
