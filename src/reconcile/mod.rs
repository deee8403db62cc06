//! Reconciliation of the manifest with changes made outside a deployment.
//!
//! One pass runs in three steps:
//!
//! 1. **Detect**: the backend compares each mod type's manifest with the
//!    destination and staging directories and reports [`FileChange`]s.
//! 2. **Decide**: every change gets a [`FileEntry`] with a default
//!    [`Action`]. Changes to merge output and changes seen during a batch
//!    installation are resolved automatically; the rest go out as one
//!    [`DecisionRequest`] and the pass blocks until it is answered.
//! 3. **Apply**: the chosen actions are carried out on disk and the
//!    manifest entries they settle are removed.
//!
//! Nothing on disk changes before step 3, so a cancelled request leaves
//! both the filesystem and the manifest untouched.
mod apply;
mod decisions;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::DeploymentBackend;
use crate::config::DEFAULT_MOD_TYPE;
use crate::error::Result;
use crate::events::EventSink;
use crate::manifest::DeployedFile;
use crate::operations::FileSystemOps;

pub use apply::apply_actions;
pub use decisions::{
    AutoResolver, CancelHandle, DecisionChannel, DecisionReply, DecisionRequest, PromptResolver,
    Resolver, spawn_resolver,
};

/// Kind of divergence between the manifest and the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The deployed file was replaced by different content.
    RefChange,
    /// The staged source was modified after deployment.
    ValChange,
    /// The deployed file is gone.
    Deleted,
    /// The staged source is gone.
    SrcDeleted,
}

impl ChangeKind {
    /// All kinds, in presentation order.
    pub const ALL: [Self; 4] = [
        Self::RefChange,
        Self::ValChange,
        Self::Deleted,
        Self::SrcDeleted,
    ];

    /// Default action outside the automatic carve-outs.
    #[must_use]
    pub const fn default_action(self) -> Action {
        match self {
            Self::RefChange => Action::Newest,
            Self::ValChange => Action::Keep,
            Self::Deleted => Action::Restore,
            Self::SrcDeleted => Action::Drop,
        }
    }

    /// Action applied without confirmation to merge output.
    #[must_use]
    pub const fn merged_action(self) -> Action {
        match self {
            Self::RefChange | Self::SrcDeleted => Action::Drop,
            Self::ValChange => Action::Keep,
            Self::Deleted => Action::Restore,
        }
    }

    /// Action applied without confirmation while a batch installation runs.
    #[must_use]
    pub const fn batch_action(self) -> Action {
        match self {
            Self::Deleted => Action::Restore,
            other => other.default_action(),
        }
    }

    /// Actions a user may pick for this kind.
    #[must_use]
    pub const fn allowed_actions(self) -> &'static [Action] {
        match self {
            Self::RefChange => &[Action::Import, Action::Drop, Action::Newest],
            Self::ValChange => &[Action::Keep],
            Self::Deleted => &[Action::Delete, Action::Restore],
            Self::SrcDeleted => &[Action::Drop, Action::Import],
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RefChange => "refchange",
            Self::ValChange => "valchange",
            Self::Deleted => "deleted",
            Self::SrcDeleted => "srcdeleted",
        })
    }
}

/// Resolution chosen for a [`FileChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move the deployed file into staging, replacing the staged copy.
    Import,
    /// Remove the deployed file; the next deployment recreates it.
    Drop,
    /// Forget the entry so the next deployment recreates the file.
    Restore,
    /// Delete the staged source.
    Delete,
    /// Leave everything as it is.
    Keep,
    /// [`Action::Drop`] or [`Action::Import`], whichever side is newer.
    Newest,
}

impl Action {
    /// Short description for prompts.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Import => "save change (use deployed file)",
            Self::Drop => "revert change (use staged file)",
            Self::Restore => "revert change (restore file)",
            Self::Delete => "save change (delete staged file)",
            Self::Keep => "keep as is",
            Self::Newest => "use newer file",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "import",
            Self::Drop => "drop",
            Self::Restore => "restore",
            Self::Delete => "delete",
            Self::Keep => "keep",
            Self::Newest => "newest",
        })
    }
}

/// One divergence reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the destination directory.
    pub file_path: String,
    /// Source directory (below staging) the file was deployed from.
    pub source: String,
    /// Path relative to `source`.
    pub source_path: String,
    /// What changed.
    pub kind: ChangeKind,
    /// Modification time of the staged source, if it exists.
    pub source_time: Option<SystemTime>,
    /// Modification time of the deployed file, if it exists.
    pub dest_time: Option<SystemTime>,
}

impl FileChange {
    /// Build a change for a manifest entry without timestamps.
    #[must_use]
    pub fn for_file(file: &DeployedFile, kind: ChangeKind) -> Self {
        Self {
            file_path: file.rel_path.clone(),
            source: file.source.clone(),
            source_path: file.source_rel().to_string(),
            kind,
            source_time: None,
            dest_time: None,
        }
    }

    /// Attach modification times.
    #[must_use]
    pub const fn with_times(
        mut self,
        source_time: Option<SystemTime>,
        dest_time: Option<SystemTime>,
    ) -> Self {
        self.source_time = source_time;
        self.dest_time = dest_time;
        self
    }
}

/// A [`FileChange`] with the action to take for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Mod type whose manifest lists the file.
    pub mod_type: String,
    /// The detected change.
    pub change: FileChange,
    /// Chosen action.
    pub action: Action,
}

impl FileEntry {
    /// Entry for `change` with the kind's default action.
    #[must_use]
    pub fn with_default(mod_type: &str, change: FileChange) -> Self {
        let action = change.kind.default_action();
        Self {
            mod_type: mod_type.to_string(),
            change,
            action,
        }
    }

    /// The action with [`Action::Newest`] decided by modification time: the
    /// deployed file is imported unless the staged source is newer.
    #[must_use]
    pub fn effective_action(&self) -> Action {
        match self.action {
            Action::Newest if self.change.source_time > self.change.dest_time => Action::Drop,
            Action::Newest => Action::Import,
            other => other,
        }
    }
}

/// Returns `true` if `source` names the merge-output directory for
/// `mod_type`.
#[must_use]
pub fn is_merge_output(source: &str, merge_dir: &str, mod_type: &str) -> bool {
    let first = source.split(['/', '\\']).next().unwrap_or_default();
    first == merge_dir
        || (mod_type != DEFAULT_MOD_TYPE
            && first.strip_prefix(merge_dir).and_then(|r| r.strip_prefix('.')) == Some(mod_type))
}

/// Settings of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Name of the merge-output directory below staging.
    pub merge_dir: String,
    /// A batch installation session is running.
    pub batch_install_active: bool,
    /// Mods being removed; no content-changed notification is sent for them.
    pub removing: BTreeSet<String>,
}

/// One mod type's manifest entries and destination.
#[derive(Debug, Clone)]
pub struct Target {
    /// Mod type id.
    pub mod_type: String,
    /// Destination directory.
    pub deploy_path: PathBuf,
    /// Manifest entries; updated in place by [`Reconciler::run`].
    pub files: Vec<DeployedFile>,
}

/// Counts of a finished pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Changes detected.
    pub detected: usize,
    /// Changes resolved without asking.
    pub automatic: usize,
    /// Changes resolved through a [`DecisionRequest`].
    pub confirmed: usize,
}

/// Collaborators of a reconciliation pass.
#[derive(Debug)]
pub struct Reconciler<'a> {
    /// Backend that probes for changes.
    pub backend: &'a dyn DeploymentBackend,
    /// Receiver of content-changed and override notifications.
    pub events: &'a dyn EventSink,
    /// Where confirmation requests go.
    pub decisions: &'a DecisionChannel,
    /// Filesystem used to apply actions.
    pub fs: &'a dyn FileSystemOps,
    /// Pass settings.
    pub options: &'a ReconcileOptions,
}

impl Reconciler<'_> {
    /// Detect, decide and apply external changes for every target.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UserCanceled`](crate::error::DeployError::UserCanceled)
    /// if the confirmation request is declined (nothing is changed in that
    /// case), or the first probing or I/O error.
    pub fn run(
        &self,
        game_id: &str,
        staging_path: &Path,
        targets: &mut [Target],
    ) -> Result<ReconcileSummary> {
        let changes = self.detect(game_id, staging_path, targets)?;
        let detected = changes.iter().map(|(_, c)| c.len()).sum();
        if detected == 0 {
            debug!(game = game_id, "no external changes");
            return Ok(ReconcileSummary::default());
        }

        let (mut entries, pending) = self.classify(changes);
        let automatic = entries.len();
        let confirmed = pending.len();
        info!(
            game = game_id,
            automatic, confirmed, "found external changes"
        );
        if !pending.is_empty() {
            entries.extend(self.decisions.request(game_id, pending)?);
        }

        for target in targets.iter_mut() {
            let own: Vec<&FileEntry> = entries
                .iter()
                .filter(|e| e.mod_type == target.mod_type)
                .collect();
            if own.is_empty() {
                continue;
            }
            apply_actions(
                self.fs,
                self.events,
                self.options,
                game_id,
                staging_path,
                target,
                &own,
            )?;
        }

        Ok(ReconcileSummary {
            detected,
            automatic,
            confirmed,
        })
    }

    /// Ask the backend for changes, probing mod types in parallel.
    fn detect(
        &self,
        game_id: &str,
        staging_path: &Path,
        targets: &[Target],
    ) -> Result<Vec<(String, Vec<FileChange>)>> {
        targets
            .par_iter()
            .filter(|t| !t.files.is_empty())
            .map(|t| {
                debug!(
                    game = game_id,
                    mod_type = %t.mod_type,
                    files = t.files.len(),
                    "checking for external changes"
                );
                self.backend
                    .external_changes(game_id, staging_path, &t.deploy_path, &t.files)
                    .map(|changes| (t.mod_type.clone(), changes))
            })
            .collect()
    }

    /// Split changes into automatically resolved entries and entries that
    /// need confirmation.
    fn classify(&self, changes: Vec<(String, Vec<FileChange>)>) -> (Vec<FileEntry>, Vec<FileEntry>) {
        let mut automatic = Vec::new();
        let mut pending = Vec::new();
        for (mod_type, list) in changes {
            for change in list {
                let mut entry = FileEntry::with_default(&mod_type, change);
                if is_merge_output(&entry.change.source, &self.options.merge_dir, &mod_type) {
                    entry.action = entry.change.kind.merged_action();
                    automatic.push(entry);
                } else if self.options.batch_install_active {
                    entry.action = entry.change.kind.batch_action();
                    automatic.push(entry);
                } else {
                    pending.push(entry);
                }
            }
        }
        (automatic, pending)
    }
}

/// Group entries by kind, in [`ChangeKind::ALL`] order.
#[must_use]
pub fn group_by_kind(entries: &[FileEntry]) -> BTreeMap<ChangeKind, Vec<&FileEntry>> {
    let mut groups: BTreeMap<ChangeKind, Vec<&FileEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.change.kind).or_default().push(entry);
    }
    groups
}
