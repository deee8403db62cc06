#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for purging symlink deployments end to end.

mod common;

use std::sync::atomic::Ordering;

use common::{GAME, TestRoot};
use moddeploy::deploy::{self, PurgeOptions, progress_key};
use moddeploy::events::RecordedEvent;
use moddeploy::manifest::{self, DeployedFile};

fn options() -> PurgeOptions {
    PurgeOptions {
        game_id: Some(GAME.to_string()),
        ..PurgeOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Basic purge
// ---------------------------------------------------------------------------

/// Every link is removed, staged files stay and the manifest is emptied.
#[test]
fn purge_removes_links_and_empties_manifest() {
    let root = TestRoot::new();
    let staged = root.stage("A", "meshes/a.nif", "a");
    root.stage("B", "b.esp", "b");
    root.deploy(&["A", "B"]);
    assert!(root.data().join("meshes/a.nif").is_symlink());

    let (ctx, events, asked) = root.context();
    let report = deploy::purge(&ctx, &options()).unwrap();

    assert_eq!(report.mod_types.len(), 1);
    assert_eq!(report.mod_types[0].files, 2);
    assert!(report.canceled.is_none());
    assert!(!root.data().join("meshes/a.nif").exists());
    assert!(!root.data().join("b.esp").exists());
    assert!(staged.exists());
    assert!(root.manifest_files().is_empty());
    assert!(manifest::manifest_path(&root.data(), "default").exists());
    assert_eq!(asked.load(Ordering::SeqCst), 0);

    let progress = events.progress_for(&progress_key(GAME));
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(matches!(
        events.events().last(),
        Some(RecordedEvent::ProgressDone { .. })
    ));
}

/// Purging twice leaves the same state as purging once.
#[test]
fn purge_is_idempotent() {
    let root = TestRoot::new();
    root.stage("A", "a.esp", "a");
    root.deploy(&["A"]);

    let (ctx, _events, _asked) = root.context();
    deploy::purge(&ctx, &options()).unwrap();
    let listing = |root: &TestRoot| {
        let mut names: Vec<String> = walkdir::WalkDir::new(root.path())
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.path().strip_prefix(root.path()).unwrap().display().to_string())
            .collect();
        names.sort();
        names
    };
    let after_first = listing(&root);

    let report = deploy::purge(&ctx, &options()).unwrap();
    assert_eq!(report.mod_types[0].files, 0);
    assert_eq!(listing(&root), after_first);
    assert!(root.manifest_files().is_empty());
}

/// Without a profile for the game the purge fails and changes nothing,
/// unless the game is being unmanaged.
#[test]
fn purge_needs_a_profile_unless_unmanaging() {
    let root = TestRoot::new().with_config_file("settings.toml", "instance_id = \"test\"\n");
    root.stage("A", "a.esp", "a");
    root.deploy(&["A"]);

    let (ctx, _events, _asked) = root.context();
    let err = deploy::purge(&ctx, &options()).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(root.manifest_files().len(), 1);

    let opts = PurgeOptions {
        unmanaging: true,
        ..options()
    };
    deploy::purge(&ctx, &opts).unwrap();
    assert!(root.manifest_files().is_empty());
}

// ---------------------------------------------------------------------------
// External changes
// ---------------------------------------------------------------------------

/// A deployed file deleted by the user is confirmed, then forgotten by
/// the default action; nothing counts as changed content.
#[test]
fn deleted_link_is_confirmed_then_forgotten() {
    let root = TestRoot::new();
    root.stage("A", "a.esp", "a");
    root.stage("A", "b.esp", "b");
    root.deploy(&["A"]);
    std::fs::remove_file(root.data().join("a.esp")).unwrap();

    let (ctx, events, asked) = root.context();
    let report = deploy::purge(&ctx, &options()).unwrap();
    assert_eq!(report.reconcile.detected, 1);
    assert_eq!(report.reconcile.confirmed, 1);
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert!(events.changed_mods().is_empty());
    assert!(!root.data().join("b.esp").exists());
    assert!(root.staging().join("A/a.esp").exists());
}

/// A replaced link whose source is merge output is dropped without asking.
#[test]
fn merge_output_refchange_is_dropped_without_request() {
    let root = TestRoot::new();
    root.stage("A", "merged.txt", "from A");
    root.stage("__merged", "merged.txt", "merged");
    root.with_scope(|scope| {
        manifest::save(
            scope,
            "test",
            &[DeployedFile::new("merged.txt", "__merged")],
            "symlink",
        )
        .unwrap()
    });
    // The link points at A's copy instead of the merge output.
    std::os::unix::fs::symlink(
        root.staging().join("A/merged.txt"),
        root.data().join("merged.txt"),
    )
    .unwrap();

    let (ctx, events, asked) = root.context();
    let report = deploy::purge(&ctx, &options()).unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 0);
    assert_eq!(report.reconcile.confirmed, 0);
    assert!(events.changed_mods().is_empty());
    assert!(root.manifest_files().is_empty());
}

/// A link replaced by a real file needs confirmation; the default takes
/// the newer side, here the user's file, into staging.
#[test]
fn replaced_link_is_confirmed_and_imported() {
    let root = TestRoot::new();
    let staged = root.stage("A", "a.ini", "staged");
    root.deploy(&["A"]);
    let deployed = root.data().join("a.ini");
    std::fs::remove_file(&deployed).unwrap();
    std::fs::write(&deployed, "edited by the user").unwrap();

    let (ctx, events, asked) = root.context();
    let report = deploy::purge(&ctx, &options()).unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(report.reconcile.confirmed, 1);
    assert_eq!(std::fs::read_to_string(&staged).unwrap(), "edited by the user");
    assert!(!deployed.exists());
    assert_eq!(events.changed_mods(), vec!["A".to_string()]);
    assert!(root.manifest_files().is_empty());
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// `purge_in_path` works from the manifest alone when the game has no
/// usable backend.
#[test]
fn purge_in_path_falls_back_to_manifest() {
    let root = TestRoot::new().with_config_file(
        "games.toml",
        "[skyrim]\nstaging_path = \"staging\"\nbackend = \"hardlink\"\n\n[skyrim.mod_types]\ndefault = \"game/Data\"\n",
    );
    root.stage("A", "a.esp", "a");
    root.deploy(&["A"]);

    let (ctx, _events, _asked) = root.context();
    assert!(deploy::purge(&ctx, &options()).is_err());

    let report = deploy::purge_in_path(&ctx, GAME, "default", &root.data()).unwrap();
    assert!(report.fallback);
    assert_eq!(report.mod_types[0].files, 1);
    assert!(!root.data().join("a.esp").exists());
    assert!(root.staging().join("A/a.esp").exists());
}
