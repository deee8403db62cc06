//! Best-effort purge driven only by the manifest on disk.
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{DeployedFile, Scope, load, save, system_time_millis};
use crate::error::{DeployError, Result};
use crate::operations::FileSystemOps;

/// Slack between a file's modification time and its recorded deployment
/// time; the recorded time has coarser precision than the filesystem.
const MTIME_TOLERANCE_MS: u64 = 1000;

/// Purge `scope` without a profile or backend.
///
/// Every file listed in the manifest is removed if it is a symlink into the
/// staging directory or has not been modified since it was deployed. Files
/// changed afterwards are left alone. Emptied directories are pruned and an
/// empty manifest is saved. Returns the number of removed files.
///
/// # Errors
///
/// Returns an error if a removal fails for a reason other than the file
/// already being gone, or if the manifest cannot be saved. After a failed
/// removal the manifest keeps every listed file still on disk.
pub fn fallback_purge(
    scope: Scope<'_>,
    instance_id: &str,
    backend_id: &str,
    fs: &dyn FileSystemOps,
) -> Result<usize> {
    let manifest = load(scope, backend_id);
    if manifest.files.is_empty() {
        debug!(
            game = scope.game_id,
            mod_type = scope.mod_type,
            "nothing to purge"
        );
        return Ok(0);
    }
    if manifest.is_foreign(instance_id) {
        warn!(
            game = scope.game_id,
            mod_type = scope.mod_type,
            "manifest was written by instance '{}', only unchanged files are removed",
            manifest.instance
        );
    }

    let deployment_method = if manifest.deployment_method.is_empty() {
        backend_id
    } else {
        manifest.deployment_method.as_str()
    };

    let mut removed = 0;
    for file in &manifest.files {
        match remove_if_unchanged(scope, file, fs) {
            Ok(true) => {
                removed += 1;
                prune_empty_parents(&file.deployed_path(scope.deploy_path), scope.deploy_path, fs);
            }
            Ok(false) => {}
            Err(e) => {
                let remaining: Vec<DeployedFile> = manifest
                    .files
                    .iter()
                    .filter(|f| fs.exists(&f.deployed_path(scope.deploy_path)))
                    .cloned()
                    .collect();
                warn!(
                    game = scope.game_id,
                    mod_type = scope.mod_type,
                    "fallback purge failed after removing {removed} files, {} still listed",
                    remaining.len()
                );
                save(scope, instance_id, &remaining, deployment_method)?;
                return Err(e);
            }
        }
    }

    save(scope, instance_id, &[], deployment_method)?;
    info!(
        game = scope.game_id,
        mod_type = scope.mod_type,
        "fallback purge removed {removed} of {} files",
        manifest.files.len()
    );
    Ok(removed)
}

fn remove_if_unchanged(
    scope: Scope<'_>,
    file: &DeployedFile,
    fs: &dyn FileSystemOps,
) -> Result<bool> {
    let path = file.deployed_path(scope.deploy_path);
    if !fs.exists(&path) {
        return Ok(false);
    }

    let ours = if fs.is_symlink(&path) {
        fs.read_link(&path)
            .is_ok_and(|target| target.starts_with(scope.staging_path))
    } else {
        match fs.modified(&path) {
            Ok(mtime) => {
                system_time_millis(mtime).saturating_sub(file.time) < MTIME_TOLERANCE_MS
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(DeployError::io(&path, e)),
        }
    };
    if !ours {
        debug!("keeping modified file {}", path.display());
        return Ok(false);
    }

    match fs.remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DeployError::io(&path, e)),
    }
}

/// Remove empty directories from the parent of `path` up to (excluding)
/// `root`.
pub(crate) fn prune_empty_parents(path: &Path, root: &Path, fs: &dyn FileSystemOps) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || fs.remove_empty_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
