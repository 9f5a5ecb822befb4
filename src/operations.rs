//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that steps can be unit-tested
//! without touching the real filesystem. Production code uses
//! [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.
//!
//! Only files the installer can access with its own privileges go through
//! here. Writes into root-owned locations are done with elevated commands.

use anyhow::{Context as _, Result};
use std::path::Path;

/// Abstraction over the filesystem queries and removals used by steps.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read a file as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Remove a file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory tree; a missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// Pre-configure file contents with the builder-style methods; removals are
/// recorded and can be inspected with [`removed`](Self::removed).
///
/// ```ignore
/// let fs = MockFileSystemOps::new().with_file("/etc/wsl.conf", "[boot]\nsystemd=true\n");
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    files: std::collections::HashMap<std::path::PathBuf, Vec<u8>>,
    removed: std::sync::Mutex<Vec<std::path::PathBuf>>,
    fail_removal: bool,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with the given contents.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<std::path::PathBuf>, contents: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.into(), contents.as_ref().to_vec());
        self
    }

    /// Make every removal fail.
    #[must_use]
    pub const fn failing_removals(mut self) -> Self {
        self.fail_removal = true;
        self
    }

    /// Paths passed to `remove_file` or `remove_dir_all`, in call order.
    #[must_use]
    pub fn removed(&self) -> Vec<std::path::PathBuf> {
        self.removed
            .lock()
            .map_or_else(|_| Vec::new(), |g| g.clone())
    }

    fn record_removal(&self, path: &Path) -> Result<()> {
        if self.fail_removal {
            anyhow::bail!("permission denied: {}", path.display());
        }
        if let Ok(mut guard) = self.removed.lock() {
            guard.push(path.to_path_buf());
        }
        Ok(())
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .with_context(|| format!("reading {}: not found", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.record_removal(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.record_removal(path)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn system_read_to_string_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wsl.conf");
        std::fs::write(&path, "[boot]\n").unwrap();
        assert_eq!(SystemFileSystemOps.read_to_string(&path).unwrap(), "[boot]\n");
    }

    #[test]
    fn system_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(SystemFileSystemOps.remove_file(&missing).is_ok());
        assert!(SystemFileSystemOps.remove_dir_all(&missing).is_ok());
    }

    #[test]
    fn system_remove_dir_all_removes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let kube = dir.path().join(".kube");
        std::fs::create_dir_all(kube.join("cache")).unwrap();
        std::fs::write(kube.join("config"), "apiVersion: v1").unwrap();
        SystemFileSystemOps.remove_dir_all(&kube).unwrap();
        assert!(!SystemFileSystemOps.exists(&kube));
    }

    #[test]
    fn mock_reads_configured_files() {
        let fs = MockFileSystemOps::new().with_file("/etc/wsl.conf", "[boot]");
        assert!(fs.exists(Path::new("/etc/wsl.conf")));
        assert_eq!(fs.read_to_string(Path::new("/etc/wsl.conf")).unwrap(), "[boot]");
        assert!(fs.read(Path::new("/missing")).is_err());
    }

    #[test]
    fn mock_records_removals() {
        let fs = MockFileSystemOps::new();
        fs.remove_dir_all(Path::new("/home/alice/.kube")).unwrap();
        assert_eq!(fs.removed(), vec![std::path::PathBuf::from("/home/alice/.kube")]);
    }
}
