//! Deployment manifests: the persisted record of what is deployed for one
//! (game, mod type).
//!
//! A manifest lives as JSON inside the mod type's destination directory,
//! with a backup copy in the staging directory:
//!
//! ```text
//! <deploy>/moddeploy.deployment.json              default mod type
//! <deploy>/moddeploy.deployment.<type>.json       any other mod type
//! <staging>/moddeploy.deployment[.<type>].json.bak
//! ```
mod fallback;
mod lock;
mod store;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MOD_TYPE;

pub use fallback::fallback_purge;
pub use lock::with_lock;
pub use store::{load, save};

/// The (game, mod type) a manifest belongs to, with its two directories.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Game id.
    pub game_id: &'a str,
    /// Mod type id.
    pub mod_type: &'a str,
    /// Destination directory of the mod type.
    pub deploy_path: &'a Path,
    /// Staging directory of the game.
    pub staging_path: &'a Path,
}

impl Scope<'_> {
    /// Path of the primary manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(self.deploy_path, self.mod_type)
    }

    /// Path of the backup manifest file.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        backup_path(self.staging_path, self.mod_type)
    }
}

/// Current on-disk format version.
pub const CURRENT_VERSION: u32 = 1;

/// File name prefix of every manifest.
pub const MANIFEST_PREFIX: &str = "moddeploy.deployment";

/// One deployed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedFile {
    /// Path relative to the destination directory.
    pub rel_path: String,
    /// Installation directory (below staging) of the owning mod, or the
    /// merge-output directory.
    pub source: String,
    /// Path relative to `source`; empty when identical to `rel_path`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_path: String,
    /// Mod type the file was deployed for.
    #[serde(default = "default_mod_type")]
    pub mod_type: String,
    /// Mods whose content was merged into this file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged: Vec<String>,
    /// Deployment time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub time: u64,
}

fn default_mod_type() -> String {
    DEFAULT_MOD_TYPE.to_string()
}

impl DeployedFile {
    /// Build a record deployed now for the default mod type.
    #[must_use]
    pub fn new(rel_path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            source: source.into(),
            source_path: String::new(),
            mod_type: default_mod_type(),
            merged: Vec::new(),
            time: now_millis(),
        }
    }

    /// Path of the file relative to its source directory.
    #[must_use]
    pub fn source_rel(&self) -> &str {
        if self.source_path.is_empty() {
            &self.rel_path
        } else {
            &self.source_path
        }
    }

    /// Absolute path of the staged source.
    #[must_use]
    pub fn staged_path(&self, staging_path: &Path) -> PathBuf {
        staging_path.join(&self.source).join(self.source_rel())
    }

    /// Absolute path of the deployed file.
    #[must_use]
    pub fn deployed_path(&self, deploy_path: &Path) -> PathBuf {
        deploy_path.join(&self.rel_path)
    }
}

/// A manifest as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Format version.
    pub version: u32,
    /// Id of the application instance that wrote the manifest.
    #[serde(default)]
    pub instance: String,
    /// Id of the backend that produced the deployment.
    #[serde(default)]
    pub deployment_method: String,
    /// Game id.
    #[serde(default)]
    pub game_id: String,
    /// Mod type id.
    #[serde(default = "default_mod_type")]
    pub mod_type: String,
    /// Time of the last save, milliseconds since the Unix epoch.
    #[serde(default)]
    pub deployment_time: u64,
    /// Staging directory the deployment was made from.
    #[serde(default)]
    pub staging_path: PathBuf,
    /// Destination directory.
    #[serde(default)]
    pub target_path: PathBuf,
    /// Deployed files.
    #[serde(default)]
    pub files: Vec<DeployedFile>,
}

impl Manifest {
    /// An empty manifest for `(game_id, mod_type)`.
    #[must_use]
    pub fn empty(game_id: &str, mod_type: &str) -> Self {
        Self {
            version: CURRENT_VERSION,
            instance: String::new(),
            deployment_method: String::new(),
            game_id: game_id.to_string(),
            mod_type: mod_type.to_string(),
            deployment_time: 0,
            staging_path: PathBuf::new(),
            target_path: PathBuf::new(),
            files: Vec::new(),
        }
    }

    /// `true` if written by a different application instance while still
    /// listing files.
    #[must_use]
    pub fn is_foreign(&self, instance_id: &str) -> bool {
        !self.files.is_empty() && !self.instance.is_empty() && self.instance != instance_id
    }
}

/// File name of the manifest for `mod_type`.
#[must_use]
pub fn manifest_file_name(mod_type: &str) -> String {
    if mod_type.is_empty() || mod_type == DEFAULT_MOD_TYPE {
        format!("{MANIFEST_PREFIX}.json")
    } else {
        format!("{MANIFEST_PREFIX}.{mod_type}.json")
    }
}

/// Path of the manifest inside the destination directory.
#[must_use]
pub fn manifest_path(deploy_path: &Path, mod_type: &str) -> PathBuf {
    deploy_path.join(manifest_file_name(mod_type))
}

/// Path of the backup manifest inside the staging directory.
#[must_use]
pub fn backup_path(staging_path: &Path, mod_type: &str) -> PathBuf {
    staging_path.join(format!("{}.bak", manifest_file_name(mod_type)))
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    system_time_millis(SystemTime::now())
}

/// Convert a [`SystemTime`] to milliseconds since the Unix epoch.
#[must_use]
pub fn system_time_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
