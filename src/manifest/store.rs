//! Loading and atomically saving manifests.
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context as _, bail};
use serde_json::Value;
use tracing::{debug, warn};

use super::{CURRENT_VERSION, DeployedFile, Manifest, Scope, now_millis};
use crate::error::{DeployError, Result};

/// Load the manifest for `scope`.
///
/// Never fails: the primary file is tried first, then the backup in the
/// staging directory, and an empty manifest is returned when neither can
/// be read. Older formats are upgraded on the fly.
#[must_use]
pub fn load(scope: Scope<'_>, backend_id: &str) -> Manifest {
    for path in [scope.manifest_path(), scope.backup_path()] {
        match read_manifest(&path) {
            Ok(Some(manifest)) => {
                debug!(
                    game = scope.game_id,
                    mod_type = scope.mod_type,
                    files = manifest.files.len(),
                    "loaded manifest {}",
                    path.display()
                );
                if !manifest.files.is_empty()
                    && !manifest.deployment_method.is_empty()
                    && manifest.deployment_method != backend_id
                {
                    warn!(
                        game = scope.game_id,
                        mod_type = scope.mod_type,
                        "manifest was written by backend '{}', current backend is '{backend_id}'",
                        manifest.deployment_method
                    );
                }
                return manifest;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    game = scope.game_id,
                    mod_type = scope.mod_type,
                    "failed to read manifest {}: {e:#}",
                    path.display()
                );
            }
        }
    }
    Manifest::empty(scope.game_id, scope.mod_type)
}

/// Save `files` as the manifest for `scope`.
///
/// The primary file is replaced atomically (temp file in the same directory,
/// then rename) so a crash never leaves a half-written manifest. The backup
/// copy in the staging directory is best effort.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created or the
/// primary file cannot be written.
pub fn save(
    scope: Scope<'_>,
    instance_id: &str,
    files: &[DeployedFile],
    backend_id: &str,
) -> Result<Manifest> {
    let mut files = files.to_vec();
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let manifest = Manifest {
        version: CURRENT_VERSION,
        instance: instance_id.to_string(),
        deployment_method: backend_id.to_string(),
        game_id: scope.game_id.to_string(),
        mod_type: scope.mod_type.to_string(),
        deployment_time: now_millis(),
        staging_path: scope.staging_path.to_path_buf(),
        target_path: scope.deploy_path.to_path_buf(),
        files,
    };
    let bytes = serde_json::to_vec_pretty(&manifest)?;

    std::fs::create_dir_all(scope.deploy_path)
        .map_err(|e| DeployError::io(scope.deploy_path, e))?;
    write_atomic(&scope.manifest_path(), &bytes)?;

    if scope.staging_path.is_dir() {
        let backup = scope.backup_path();
        if let Err(e) = write_atomic(&backup, &bytes) {
            warn!(game = scope.game_id, "failed to write manifest backup: {e}");
        }
    }

    debug!(
        game = scope.game_id,
        mod_type = scope.mod_type,
        files = manifest.files.len(),
        "saved manifest"
    );
    Ok(manifest)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DeployError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| DeployError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DeployError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| DeployError::io(path, e.error))?;
    Ok(())
}

/// Read and upgrade one manifest file. `Ok(None)` means the file is absent.
fn read_manifest(path: &Path) -> anyhow::Result<Option<Manifest>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let value: Value = serde_json::from_slice(&bytes).context("invalid JSON")?;
    upgrade(value).map(Some)
}

/// Bring a parsed document of any supported version to [`CURRENT_VERSION`].
fn upgrade(value: Value) -> anyhow::Result<Manifest> {
    match value {
        // Version 0 stored the bare file list.
        Value::Array(entries) => Ok(Manifest {
            files: repair(entries),
            ..Manifest::empty("", "")
        }),
        Value::Object(mut map) => {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            if version > u64::from(CURRENT_VERSION) {
                bail!("manifest version {version} is newer than supported {CURRENT_VERSION}");
            }
            let entries = match map.remove("files") {
                Some(Value::Array(entries)) => entries,
                _ => Vec::new(),
            };
            map.insert("version".into(), Value::from(CURRENT_VERSION));
            let mut manifest: Manifest =
                serde_json::from_value(Value::Object(map)).context("invalid manifest header")?;
            manifest.files = repair(entries);
            Ok(manifest)
        }
        _ => bail!("manifest is neither an object nor a list"),
    }
}

/// Decode entries one by one, dropping those without a path or source.
fn repair(entries: Vec<Value>) -> Vec<DeployedFile> {
    let total = entries.len();
    let files: Vec<DeployedFile> = entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<DeployedFile>(v).ok())
        .filter(|f| !f.rel_path.is_empty() && !f.source.is_empty())
        .collect();
    if files.len() < total {
        warn!(
            dropped = total - files.len(),
            "dropped invalid manifest entries"
        );
    }
    files
}
