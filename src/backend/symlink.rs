//! Symlink deployment backend.
//!
//! Deployed files are symbolic links from the destination into the staging
//! directory. Creating the links is the job of the deployment pipeline; this
//! backend covers purging and change detection.
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::DeploymentBackend;
use crate::error::{DeployError, Result};
use crate::manifest::{DeployedFile, system_time_millis};
use crate::reconcile::{ChangeKind, FileChange};

/// Slack for comparing a staged file's mtime with the recorded deployment
/// time.
const MTIME_TOLERANCE_MS: u64 = 1000;

/// Backend whose deployments are symbolic links into staging.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkBackend;

impl SymlinkBackend {
    /// Backend id stored in manifests.
    pub const ID: &'static str = "symlink";

    /// Create the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DeploymentBackend for SymlinkBackend {
    fn id(&self) -> &str {
        Self::ID
    }

    fn pre_purge(&self, staging_path: &Path) -> Result<()> {
        if !staging_path.is_dir() {
            return Err(DeployError::ProcessCanceled(format!(
                "staging directory {} is not available",
                staging_path.display()
            )));
        }
        Ok(())
    }

    fn purge(
        &self,
        staging_path: &Path,
        deploy_path: &Path,
        game_id: &str,
        progress: &dyn Fn(u8),
    ) -> Result<()> {
        if !deploy_path.is_dir() {
            progress(100);
            return Ok(());
        }
        let links = links_into(staging_path, deploy_path);
        debug!(
            game = game_id,
            links = links.len(),
            "removing links from {}",
            deploy_path.display()
        );

        let total = links.len().max(1);
        for (i, link) in links.iter().enumerate() {
            remove_symlink(link)?;
            trace!("removed {}", link.display());
            progress(percent(i + 1, total));
        }

        prune_empty_dirs(deploy_path);
        progress(100);
        Ok(())
    }

    fn post_purge(&self) -> Result<()> {
        Ok(())
    }

    fn is_deployed(
        &self,
        staging_path: &Path,
        deploy_path: &Path,
        file: &DeployedFile,
    ) -> Result<bool> {
        let deployed = file.deployed_path(deploy_path);
        match std::fs::read_link(&deployed) {
            Ok(target) => Ok(paths_equal(&target, &file.staged_path(staging_path))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            // Not a link: a regular file at that path is not ours.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(false),
            Err(e) => Err(DeployError::io(&deployed, e)),
        }
    }

    fn external_changes(
        &self,
        game_id: &str,
        staging_path: &Path,
        deploy_path: &Path,
        files: &[DeployedFile],
    ) -> Result<Vec<FileChange>> {
        let changes: Vec<FileChange> = files
            .par_iter()
            .map(|file| classify(staging_path, deploy_path, file))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        debug!(
            game = game_id,
            checked = files.len(),
            changed = changes.len(),
            "probed {}",
            deploy_path.display()
        );
        Ok(changes)
    }
}

/// Compare one manifest entry with the filesystem.
fn classify(
    staging_path: &Path,
    deploy_path: &Path,
    file: &DeployedFile,
) -> Result<Option<FileChange>> {
    let deployed = file.deployed_path(deploy_path);
    let staged = file.staged_path(staging_path);

    let dest_meta = optional(std::fs::symlink_metadata(&deployed), &deployed)?;
    let src_meta = optional(std::fs::metadata(&staged), &staged)?;
    let src_time = src_meta.as_ref().and_then(|m| m.modified().ok());
    let dest_time = dest_meta.as_ref().and_then(|m| m.modified().ok());
    let change = |kind| Some(FileChange::for_file(file, kind).with_times(src_time, dest_time));

    if src_meta.is_none() {
        return Ok(change(ChangeKind::SrcDeleted));
    }
    let Some(dest_meta) = dest_meta else {
        return Ok(change(ChangeKind::Deleted));
    };

    if dest_meta.file_type().is_symlink() {
        let target = std::fs::read_link(&deployed).map_err(|e| DeployError::io(&deployed, e))?;
        if !paths_equal(&target, &staged) {
            return Ok(change(ChangeKind::RefChange));
        }
    } else if src_time != dest_time || !same_content(&deployed, &staged)? {
        return Ok(change(ChangeKind::RefChange));
    } else {
        return Ok(None);
    }

    let modified_after_deploy = src_time.is_some_and(|t: SystemTime| {
        system_time_millis(t).saturating_sub(file.time) > MTIME_TOLERANCE_MS
    });
    if modified_after_deploy {
        return Ok(change(ChangeKind::ValChange));
    }
    Ok(None)
}

fn optional<T>(result: io::Result<T>, path: &Path) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DeployError::io(path, e)),
    }
}

fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let len = |p: &Path| std::fs::metadata(p).map(|m| m.len()).map_err(|e| DeployError::io(p, e));
    if len(a)? != len(b)? {
        return Ok(false);
    }
    let read = |p: &Path| std::fs::read(p).map_err(|e| DeployError::io(p, e));
    Ok(read(a)? == read(b)?)
}

/// Symlinks below `deploy_path` that point into `staging_path`.
fn links_into(staging_path: &Path, deploy_path: &Path) -> Vec<PathBuf> {
    let staging = dunce::canonicalize(staging_path).unwrap_or_else(|_| staging_path.to_path_buf());
    WalkDir::new(deploy_path)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|entry| entry.path_is_symlink())
        .filter(|entry| {
            std::fs::read_link(entry.path()).is_ok_and(|target| {
                target.starts_with(staging_path) || target.starts_with(&staging)
            })
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Remove empty directories below `root`, deepest first.
fn prune_empty_dirs(root: &Path) {
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir())
    {
        if std::fs::remove_dir(entry.path()).is_ok() {
            trace!("removed empty directory {}", entry.path().display());
        }
    }
}

fn percent(done: usize, total: usize) -> u8 {
    u8::try_from(done.saturating_mul(100) / total.max(1)).unwrap_or(100)
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Remove a symlink, handling platform differences.
///
/// On Windows, directory symlinks must be removed with `remove_dir`, and
/// `symlink_metadata().is_dir()` reports `false` for them, so the raw
/// `FILE_ATTRIBUTE_DIRECTORY` flag decides.
fn remove_symlink(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DeployError::io(path, e)),
    };
    let removed = if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(DeployError::io(path, e)),
        _ => Ok(()),
    }
}

fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}
