//! Filesystem operation abstractions for dependency injection.
//!
//! Reconciliation and the fallback purge mutate deployed and staged files
//! through [`FileSystemOps`] so their error handling can be unit-tested
//! without provoking real I/O failures. Production code uses
//! [`SystemFileSystemOps`].

use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Filesystem mutations and queries used by reconciliation and purge.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if something (including a dangling symlink) exists at
    /// `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Modification time of `path` without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Returns `true` if `path` is a symlink.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Read the target of the symbolic link at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a symlink or cannot be read.
    fn read_link(&self, path: &Path) -> io::Result<std::path::PathBuf>;

    /// Remove the file or symlink at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove `path` if it is an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not an empty directory.
    fn remove_empty_dir(&self, path: &Path) -> io::Result<()>;

    /// Move `from` to `to`, creating the parent directory of `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent cannot be created or the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::symlink_metadata(path)?.modified()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
    }

    fn read_link(&self, path: &Path) -> io::Result<std::path::PathBuf> {
        std::fs::read_link(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_empty_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from, to)
    }
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// Wraps [`SystemFileSystemOps`] and lets a test force specific operations
/// to fail with a chosen [`io::ErrorKind`], recording every mutation.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    fail_rename: Option<io::ErrorKind>,
    fail_remove: Option<io::ErrorKind>,
    fail_remove_of: Option<(String, io::ErrorKind)>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create a mock that behaves like the real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `rename` fail with `kind`.
    #[must_use]
    pub const fn failing_rename(mut self, kind: io::ErrorKind) -> Self {
        self.fail_rename = Some(kind);
        self
    }

    /// Make every `remove_file` fail with `kind`.
    #[must_use]
    pub const fn failing_remove(mut self, kind: io::ErrorKind) -> Self {
        self.fail_remove = Some(kind);
        self
    }

    /// Make `remove_file` fail with `kind` for paths ending in `name`.
    #[must_use]
    pub fn failing_remove_of(mut self, name: &str, kind: io::ErrorKind) -> Self {
        self.fail_remove_of = Some((name.to_string(), kind));
        self
    }

    /// Mutations performed so far, as `op path` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record(&self, op: &str, path: &Path) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("{op} {}", path.display()));
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        SystemFileSystemOps.modified(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_symlink(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<std::path::PathBuf> {
        SystemFileSystemOps.read_link(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.record("remove", path);
        if let Some(kind) = self.fail_remove {
            return Err(io::Error::from(kind));
        }
        if let Some((name, kind)) = &self.fail_remove_of
            && path.ends_with(name)
        {
            return Err(io::Error::from(*kind));
        }
        SystemFileSystemOps.remove_file(path)
    }

    fn remove_empty_dir(&self, path: &Path) -> io::Result<()> {
        SystemFileSystemOps.remove_empty_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("rename", from);
        if let Some(kind) = self.fail_rename {
            return Err(io::Error::from(kind));
        }
        SystemFileSystemOps.rename(from, to)
    }
}
