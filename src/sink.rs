//! Persistence sinks for exported artifacts.

use crate::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Base name used when the caller supplies none.
pub const DEFAULT_BASE_NAME: &str = "document";

/// A persisted export.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// File name including the `.pdf` extension
    pub name: String,
    /// Where the sink put it, if it has a location
    pub location: Option<PathBuf>,
    pub size: usize,
}

/// Destination for finished artifacts.
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `name`. Either the whole artifact lands or nothing does.
    fn persist(&self, name: &str, bytes: &[u8]) -> Result<Artifact>;
}

/// `<base>.pdf`, with `document` standing in for an empty base.
///
/// Path separators and control characters are replaced so the result is a
/// single file name.
pub fn artifact_name(base: &str) -> String {
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = cleaned.trim_end_matches(".pdf");
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        format!("{}.pdf", DEFAULT_BASE_NAME)
    } else {
        format!("{}.pdf", stem)
    }
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for FileSink {
    fn persist(&self, name: &str, bytes: &[u8]) -> Result<Artifact> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::PersistenceFailure(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let final_path = self.dir.join(name);
        let part_path = self.dir.join(format!(".{}.part", name));

        if let Err(e) = write_part(&part_path, bytes).and_then(|_| fs::rename(&part_path, &final_path)) {
            remove_quiet(&part_path);
            return Err(Error::PersistenceFailure(format!(
                "cannot write {}: {}",
                final_path.display(),
                e
            )));
        }

        debug!("persisted {} bytes to {}", bytes.len(), final_path.display());
        Ok(Artifact {
            name: name.to_string(),
            location: Some(final_path),
            size: bytes.len(),
        })
    }
}

fn write_part(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn remove_quiet(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Keeps artifacts in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().ok()?.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .artifacts
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn persist(&self, name: &str, bytes: &[u8]) -> Result<Artifact> {
        let mut artifacts = self
            .artifacts
            .lock()
            .map_err(|_| Error::PersistenceFailure("memory sink lock poisoned".into()))?;
        artifacts.insert(name.to_string(), bytes.to_vec());
        Ok(Artifact {
            name: name.to_string(),
            location: None,
            size: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_base_falls_back_to_document() {
        assert_eq!(artifact_name(""), "document.pdf");
        assert_eq!(artifact_name("   "), "document.pdf");
        assert_eq!(artifact_name(".pdf"), "document.pdf");
    }

    #[test]
    fn base_is_sanitized() {
        assert_eq!(artifact_name("notes"), "notes.pdf");
        assert_eq!(artifact_name("notes.pdf"), "notes.pdf");
        assert_eq!(artifact_name("../etc/passwd"), ".._etc_passwd.pdf");
        assert_eq!(artifact_name("a/b"), "a_b.pdf");
        assert_eq!(artifact_name("week 1: plan"), "week 1_ plan.pdf");
    }

    #[test]
    fn file_sink_writes_atomically() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let artifact = sink.persist("out.pdf", b"%PDF-1.5 test").unwrap();
        let path = artifact.location.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.5 test");
        assert_eq!(artifact.size, 13);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn file_sink_failure_leaves_nothing() {
        let dir = tempdir().unwrap();
        // a directory where the file should go makes the rename fail
        fs::create_dir(dir.path().join("taken.pdf")).unwrap();
        fs::write(dir.path().join("taken.pdf").join("keep"), b"x").unwrap();
        let sink = FileSink::new(dir.path());
        let err = sink.persist("taken.pdf", b"data").unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
        assert!(!dir.path().join(".taken.pdf.part").exists());
    }

    #[test]
    fn memory_sink_round_trip() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.persist("a.pdf", b"1").unwrap();
        assert_eq!(sink.get("a.pdf").unwrap(), b"1");
        assert_eq!(sink.names(), vec!["a.pdf".to_string()]);
    }
}
