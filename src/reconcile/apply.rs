//! Carrying out the chosen actions.
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use super::{Action, ChangeKind, FileEntry, ReconcileOptions, Target, is_merge_output};
use crate::error::{DeployError, Result};
use crate::events::{EventSink, ModPaths};
use crate::operations::FileSystemOps;

/// Apply `entries` (all for `target`'s mod type) and drop the settled
/// records from `target.files`.
///
/// Drops run first, then deletions, then imports. A file that vanished
/// before it could be imported counts as already resolved.
///
/// # Errors
///
/// Returns the first I/O error other than a missing file. Files handled
/// before the error stay handled; `target.files` is left unchanged.
pub fn apply_actions(
    fs: &dyn FileSystemOps,
    events: &dyn EventSink,
    options: &ReconcileOptions,
    game_id: &str,
    staging_path: &Path,
    target: &mut Target,
    entries: &[&FileEntry],
) -> Result<()> {
    let resolved: Vec<(&FileEntry, Action)> =
        entries.iter().map(|e| (*e, e.effective_action())).collect();
    let of = |wanted: Action| {
        resolved
            .iter()
            .filter(move |(_, action)| *action == wanted)
            .map(|(entry, _)| *entry)
    };

    for entry in of(Action::Drop) {
        let deployed = target.deploy_path.join(&entry.change.file_path);
        remove_if_present(fs, &deployed)?;
    }
    for entry in of(Action::Delete) {
        let staged = staged_path(staging_path, entry);
        remove_if_present(fs, &staged)?;
    }
    for entry in of(Action::Import) {
        let deployed = target.deploy_path.join(&entry.change.file_path);
        let staged = staged_path(staging_path, entry);
        import(fs, &deployed, &staged)?;
    }

    let settled: BTreeSet<&str> = resolved
        .iter()
        .filter(|(_, action)| {
            matches!(
                action,
                Action::Drop | Action::Restore | Action::Delete | Action::Import
            )
        })
        .map(|(entry, _)| entry.change.file_path.as_str())
        .collect();
    let before = target.files.len();
    target
        .files
        .retain(|f| !settled.contains(f.rel_path.as_str()));
    debug!(
        game = game_id,
        mod_type = %target.mod_type,
        removed = before - target.files.len(),
        "applied external change actions"
    );

    notify(events, options, game_id, &target.mod_type, entries);
    Ok(())
}

fn staged_path(staging_path: &Path, entry: &FileEntry) -> std::path::PathBuf {
    staging_path
        .join(&entry.change.source)
        .join(&entry.change.source_path)
}

fn remove_if_present(fs: &dyn FileSystemOps, path: &Path) -> Result<()> {
    match fs.remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DeployError::io(path, e)),
    }
}

/// Replace the staged copy with the deployed file. The staged copy is
/// removed before the move so a move onto the same inode cannot fail.
fn import(fs: &dyn FileSystemOps, deployed: &Path, staged: &Path) -> Result<()> {
    remove_if_present(fs, staged)?;
    match fs.rename(deployed, staged) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("file disappeared: {}", deployed.display());
            Ok(())
        }
        Err(e) => Err(DeployError::io(deployed, e)),
    }
}

/// Send content-changed notifications for affected mods and an override
/// check for staged files the user chose to drop.
fn notify(
    events: &dyn EventSink,
    options: &ReconcileOptions,
    game_id: &str,
    mod_type: &str,
    entries: &[&FileEntry],
) {
    let mut affected = BTreeSet::new();
    let mut overrides: ModPaths = BTreeMap::new();
    for entry in entries {
        let source = entry.change.source.as_str();
        if is_merge_output(source, &options.merge_dir, mod_type) {
            continue;
        }
        if entry.action != Action::Restore {
            affected.insert(source);
        }
        if entry.change.kind == ChangeKind::SrcDeleted && entry.action == Action::Drop {
            overrides
                .entry(source.to_string())
                .or_default()
                .push(entry.change.file_path.clone());
        }
    }

    if !overrides.is_empty() {
        events.check_file_override_redundancies(game_id, &overrides);
    }
    for mod_id in affected {
        if !options.removing.contains(mod_id) {
            events.mod_content_changed(game_id, mod_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::events::{RecordedEvent, RecordingEvents};
    use crate::manifest::DeployedFile;
    use crate::operations::{MockFileSystemOps, SystemFileSystemOps};
    use crate::reconcile::FileChange;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    struct Fixture {
        _tmp: tempfile::TempDir,
        staging: PathBuf,
        target: Target,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("staging");
        let deploy = tmp.path().join("Data");
        std::fs::create_dir_all(staging.join("modA")).unwrap();
        std::fs::create_dir_all(&deploy).unwrap();
        let mut records = Vec::new();
        for name in files {
            std::fs::write(staging.join("modA").join(name), "staged").unwrap();
            std::fs::write(deploy.join(name), "deployed").unwrap();
            records.push(DeployedFile::new(*name, "modA"));
        }
        Fixture {
            _tmp: tmp,
            staging,
            target: Target {
                mod_type: "default".into(),
                deploy_path: deploy,
                files: records,
            },
        }
    }

    fn entry(path: &str, kind: ChangeKind, action: Action) -> FileEntry {
        FileEntry {
            mod_type: "default".into(),
            change: FileChange::for_file(&DeployedFile::new(path, "modA"), kind),
            action,
        }
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions {
            merge_dir: "__merged".into(),
            ..ReconcileOptions::default()
        }
    }

    #[test]
    fn drop_removes_deployed_and_entry() {
        let mut fx = fixture(&["a.esp", "b.esp"]);
        let events = RecordingEvents::new();
        let e = entry("a.esp", ChangeKind::RefChange, Action::Drop);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        assert!(!fx.target.deploy_path.join("a.esp").exists());
        assert!(fx.staging.join("modA/a.esp").exists());
        let left: Vec<&str> = fx.target.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(left, vec!["b.esp"]);
        assert_eq!(events.changed_mods(), vec!["modA".to_string()]);
    }

    #[test]
    fn import_moves_deployed_into_staging() {
        let mut fx = fixture(&["a.esp"]);
        let events = RecordingEvents::new();
        let e = entry("a.esp", ChangeKind::RefChange, Action::Import);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(fx.staging.join("modA/a.esp")).unwrap(),
            "deployed"
        );
        assert!(!fx.target.deploy_path.join("a.esp").exists());
        assert!(fx.target.files.is_empty());
    }

    #[test]
    fn newest_resolves_by_time() {
        let mut fx = fixture(&["a.esp"]);
        let now = SystemTime::now();
        let mut e = entry("a.esp", ChangeKind::RefChange, Action::Newest);
        e.change = e
            .change
            .with_times(Some(now), Some(now - Duration::from_secs(10)));
        apply_actions(
            &SystemFileSystemOps,
            &RecordingEvents::new(),
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        // The staged file is newer, so the deployed copy is dropped.
        assert_eq!(
            std::fs::read_to_string(fx.staging.join("modA/a.esp")).unwrap(),
            "staged"
        );
        assert!(!fx.target.deploy_path.join("a.esp").exists());
    }

    #[test]
    fn delete_removes_staged_source_only() {
        let mut fx = fixture(&["a.esp", "b.esp"]);
        let events = RecordingEvents::new();
        let e = entry("a.esp", ChangeKind::Deleted, Action::Delete);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        assert!(!fx.staging.join("modA/a.esp").exists());
        assert_eq!(
            std::fs::read_to_string(fx.target.deploy_path.join("a.esp")).unwrap(),
            "deployed"
        );
        assert!(fx.staging.join("modA/b.esp").exists());
        let left: Vec<&str> = fx.target.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(left, vec!["b.esp"]);
        assert_eq!(events.changed_mods(), vec!["modA".to_string()]);
    }

    #[test]
    fn missing_file_during_import_is_swallowed() {
        let mut fx = fixture(&["a.esp"]);
        let fs = MockFileSystemOps::new().failing_rename(io::ErrorKind::NotFound);
        let e = entry("a.esp", ChangeKind::SrcDeleted, Action::Import);
        apply_actions(
            &fs,
            &RecordingEvents::new(),
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        assert!(fx.target.files.is_empty());
        assert_eq!(fs.calls().len(), 2);
    }

    #[test]
    fn other_io_errors_propagate_and_keep_manifest() {
        let mut fx = fixture(&["a.esp"]);
        let fs = MockFileSystemOps::new().failing_remove(io::ErrorKind::PermissionDenied);
        let e = entry("a.esp", ChangeKind::RefChange, Action::Drop);
        let err = apply_actions(
            &fs,
            &RecordingEvents::new(),
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
        assert_eq!(fx.target.files.len(), 1);
    }

    #[test]
    fn keep_and_restore_touch_nothing_on_disk() {
        let mut fx = fixture(&["a.esp", "b.esp"]);
        let events = RecordingEvents::new();
        let keep = entry("a.esp", ChangeKind::ValChange, Action::Keep);
        let restore = entry("b.esp", ChangeKind::Deleted, Action::Restore);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&keep, &restore],
        )
        .unwrap();
        assert!(fx.target.deploy_path.join("a.esp").exists());
        assert!(fx.target.deploy_path.join("b.esp").exists());
        let left: Vec<&str> = fx.target.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(left, vec!["a.esp"]);
        assert_eq!(events.changed_mods(), vec!["modA".to_string()]);
    }

    #[test]
    fn dropped_sources_trigger_override_check() {
        let mut fx = fixture(&["a.esp"]);
        std::fs::remove_file(fx.staging.join("modA/a.esp")).unwrap();
        let events = RecordingEvents::new();
        let e = entry("a.esp", ChangeKind::SrcDeleted, Action::Drop);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &options(),
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        let expected: ModPaths = [("modA".to_string(), vec!["a.esp".to_string()])].into();
        assert!(events.events().contains(&RecordedEvent::CheckOverrides {
            game_id: "skyrim".into(),
            files: expected,
        }));
    }

    #[test]
    fn removing_mods_are_not_notified() {
        let mut fx = fixture(&["a.esp"]);
        let events = RecordingEvents::new();
        let mut opts = options();
        opts.removing.insert("modA".into());
        let e = entry("a.esp", ChangeKind::RefChange, Action::Drop);
        apply_actions(
            &SystemFileSystemOps,
            &events,
            &opts,
            "skyrim",
            &fx.staging,
            &mut fx.target,
            &[&e],
        )
        .unwrap();
        assert!(events.changed_mods().is_empty());
    }
}
