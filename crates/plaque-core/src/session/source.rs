//! Where a session reads its notebook source from.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Supplies the current text of a notebook.
pub trait SourceProvider {
    fn current_source(&self) -> Result<String>;

    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;
}

/// Reads the notebook from a file on every call.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceProvider for FileSource {
    fn current_source(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_current_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.py");
        fs::write(&path, "x = 1\n").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.current_source().unwrap(), "x = 1\n");
        fs::write(&path, "x = 2\n").unwrap();
        assert_eq!(source.current_source().unwrap(), "x = 2\n");
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let source = FileSource::new("/nonexistent/plaque/nb.py");
        assert!(matches!(source.current_source(), Err(Error::Read { .. })));
    }
}
