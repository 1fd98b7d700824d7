//! Scoped temporary download destinations.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use super::DownloadError;

/// File name prefix of every temporary destination.
const TEMP_PREFIX: &str = "changelog-mirror-";

/// A temporary file exclusively owned by one download attempt.
///
/// The file is created empty on acquisition and deleted either by
/// [`release`](Self::release) or, on any other exit path including a panic
/// unwinding through the owner, when the value is dropped.
#[derive(Debug)]
pub struct TempDestination {
    path: TempPath,
}

impl TempDestination {
    /// Creates a fresh empty file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::TempFile`] if the file cannot be created.
    pub fn acquire(dir: &Path) -> Result<Self, DownloadError> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| DownloadError::temp_file(dir, e))?;
        // Close our handle; the transport opens the path itself.
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Returns the file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now, reporting a deletion failure.
    ///
    /// # Errors
    ///
    /// Returns the IO error from removing the file. A file that is already
    /// gone is not an error.
    pub fn release(self) -> io::Result<PathBuf> {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_acquire_creates_empty_file_in_dir() {
        let dir = TempDir::new().unwrap();
        let dest = TempDestination::acquire(dir.path()).unwrap();
        assert!(dest.path().exists());
        assert_eq!(dest.path().parent(), Some(dir.path()));
        assert_eq!(std::fs::metadata(dest.path()).unwrap().len(), 0);
        assert!(
            dest.path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(TEMP_PREFIX)
        );
    }

    #[test]
    fn test_release_deletes_file() {
        let dir = TempDir::new().unwrap();
        let dest = TempDestination::acquire(dir.path()).unwrap();
        std::fs::write(dest.path(), b"partial").unwrap();

        let path = dest.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_release_tolerates_already_deleted_file() {
        let dir = TempDir::new().unwrap();
        let dest = TempDestination::acquire(dir.path()).unwrap();
        std::fs::remove_file(dest.path()).unwrap();
        assert!(dest.release().is_ok());
    }

    #[test]
    fn test_drop_deletes_file() {
        let dir = TempDir::new().unwrap();
        let dest = TempDestination::acquire(dir.path()).unwrap();
        let path = dest.path().to_path_buf();
        drop(dest);
        assert!(!path.exists());
    }

    #[test]
    fn test_acquire_in_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            TempDestination::acquire(&missing),
            Err(DownloadError::TempFile { .. })
        ));
    }
}
