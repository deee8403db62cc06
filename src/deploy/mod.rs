//! Purge orchestration.
//!
//! A purge loads the manifest of every deployable mod type, reconciles
//! external changes, lets the backend remove its links and saves empty
//! manifests, all while holding the staging path's lock. Progress is
//! reported under `purge-<game>`:
//!
//! | Percent | Phase |
//! |---|---|
//! | 0-25 | external-change detection |
//! | 25-75 | link removal |
//! | 75-85 | manifest save |
//! | 85-100 | summary and notifications |
mod context;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::DeploymentBackend;
use crate::error::{DeployError, Result};
use crate::events::EventSink;
use crate::logging::TaskStatus;
use crate::manifest::{self, Scope};
use crate::reconcile::{ReconcileOptions, ReconcileSummary, Reconciler, Target};

pub use context::DeployContext;

const PHASE_DETECT: u8 = 0;
const PHASE_REMOVE: u8 = 25;
const PHASE_SAVE: u8 = 75;
const PHASE_NOTIFY: u8 = 85;
const PHASE_DONE: u8 = 100;

/// What to purge and under which circumstances.
#[derive(Debug, Clone, Default)]
pub struct PurgeOptions {
    /// Game to purge; the active profile's game if `None`.
    pub game_id: Option<String>,
    /// The game is being unmanaged: accept any of its profiles.
    pub unmanaging: bool,
    /// Mods being removed; no content-changed notifications for them.
    pub removing: BTreeSet<String>,
    /// Treat the purge as part of a batch installation.
    pub batch_install_active: bool,
}

/// Manifest size of one mod type before the purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModTypeOutcome {
    /// Mod type id.
    pub mod_type: String,
    /// Entries the manifest listed.
    pub files: usize,
}

/// Result of a finished purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Purged game.
    pub game_id: String,
    /// One entry per mod type with a destination.
    pub mod_types: Vec<ModTypeOutcome>,
    /// External changes handled before removal.
    pub reconcile: ReconcileSummary,
    /// Set when the backend stopped early; the manifest then lists what is
    /// still deployed.
    pub canceled: Option<String>,
    /// The purge used the backend-less fallback.
    pub fallback: bool,
}

/// Progress key of a purge of `game_id`.
#[must_use]
pub fn progress_key(game_id: &str) -> String {
    format!("purge-{game_id}")
}

/// Purge every deployed file of a game.
///
/// # Errors
///
/// - [`DeployError::NoActiveProfile`] if no profile can be resolved
/// - [`DeployError::NoBackend`] if the game's backend is not registered
/// - [`DeployError::UserCanceled`] if external-change confirmation was
///   declined; nothing is changed
/// - any other backend or I/O error, after the manifest has been reduced
///   to the files the backend still reports as deployed
pub fn purge(ctx: &DeployContext, options: &PurgeOptions) -> Result<PurgeReport> {
    let game_id = options
        .game_id
        .clone()
        .or_else(|| ctx.config.active_game().map(str::to_string))
        .ok_or_else(|| DeployError::NoActiveProfile("(none)".to_string()))?;
    if ctx.config.profile_for(&game_id, options.unmanaging).is_none() {
        return Err(DeployError::NoActiveProfile(game_id));
    }
    let game = ctx.config.game(&game_id)?;
    let backend = ctx.backends.for_game(&game_id, &game.backend)?;
    for (mod_type, _) in game
        .mod_types
        .iter()
        .filter(|(_, path)| path.as_os_str().is_empty())
    {
        ctx.log.record_task(
            &format!("{game_id}/{mod_type}"),
            TaskStatus::NotApplicable,
            Some("no destination"),
        );
    }
    let destinations: Vec<(String, PathBuf)> = game
        .deployable_mod_types()
        .map(|(mod_type, path)| (mod_type.to_string(), path.to_path_buf()))
        .collect();

    run_purge(
        ctx,
        backend,
        &game_id,
        &game.staging_path,
        &destinations,
        &reconcile_options(ctx, options),
    )
}

/// Purge every game that has at least one manifest, unmanaging each.
///
/// Games are handled one after another; a failure is recorded and does not
/// stop the others.
#[must_use]
pub fn purge_all(
    ctx: &DeployContext,
    options: &PurgeOptions,
) -> Vec<(String, Result<PurgeReport>)> {
    ctx.config
        .games
        .iter()
        .filter(|(_, game)| {
            game.deployable_mod_types()
                .any(|(mod_type, path)| manifest::manifest_path(path, mod_type).exists())
        })
        .map(|(game_id, _)| {
            let opts = PurgeOptions {
                game_id: Some(game_id.clone()),
                unmanaging: true,
                ..options.clone()
            };
            let result = purge(ctx, &opts);
            if let Err(e) = &result
                && !matches!(e, DeployError::UserCanceled)
            {
                ctx.log
                    .record_task(game_id, TaskStatus::Failed, Some(&e.to_string()));
            }
            (game_id.clone(), result)
        })
        .collect()
}

/// Purge a single mod type's destination.
///
/// Without a profile for the game or a registered backend the purge falls
/// back to removing what the manifest in `deploy_path` lists.
///
/// # Errors
///
/// Same as [`purge`], minus the profile and backend errors.
pub fn purge_in_path(
    ctx: &DeployContext,
    game_id: &str,
    mod_type: &str,
    deploy_path: &Path,
) -> Result<PurgeReport> {
    let game = ctx.config.game(game_id)?;
    let staging_path = game.staging_path.as_path();
    let profile = ctx.config.profile_for(game_id, false);
    let backend = ctx.backends.for_game(game_id, &game.backend);

    if let (Some(_), Ok(backend)) = (profile, &backend) {
        return run_purge(
            ctx,
            *backend,
            game_id,
            staging_path,
            &[(mod_type.to_string(), deploy_path.to_path_buf())],
            &reconcile_options(ctx, &PurgeOptions::default()),
        );
    }

    let backend_id = backend.map_or_else(|_| game.backend.clone(), |b| b.id().to_string());
    info!(
        game = game_id,
        mod_type, "no profile or backend, purging from manifest"
    );
    let scope = Scope {
        game_id,
        mod_type,
        deploy_path,
        staging_path,
    };
    if ctx.dry_run {
        let listed = manifest::load(scope, &backend_id).files.len();
        ctx.log.dry_run(&format!(
            "would remove {listed} file(s) listed in {}",
            scope.manifest_path().display()
        ));
        ctx.log.record_task(
            &format!("{game_id}/{mod_type}"),
            TaskStatus::DryRun,
            Some(&format!("{listed} file(s), fallback")),
        );
        return Ok(PurgeReport {
            game_id: game_id.to_string(),
            mod_types: vec![ModTypeOutcome {
                mod_type: mod_type.to_string(),
                files: listed,
            }],
            fallback: true,
            ..PurgeReport::default()
        });
    }
    let removed = manifest::with_lock(staging_path, true, || {
        manifest::fallback_purge(scope, ctx.instance_id(), &backend_id, ctx.fs_ops.as_ref())
    })?;
    ctx.log.record_task(
        &format!("{game_id}/{mod_type}"),
        TaskStatus::Ok,
        Some(&format!("{removed} file(s), fallback")),
    );
    Ok(PurgeReport {
        game_id: game_id.to_string(),
        mod_types: vec![ModTypeOutcome {
            mod_type: mod_type.to_string(),
            files: removed,
        }],
        fallback: true,
        ..PurgeReport::default()
    })
}

fn reconcile_options(ctx: &DeployContext, options: &PurgeOptions) -> ReconcileOptions {
    ReconcileOptions {
        merge_dir: ctx.config.settings.merge_dir.clone(),
        batch_install_active: options.batch_install_active
            || ctx.config.settings.batch_install_active,
        removing: options.removing.clone(),
    }
}

/// One purge pass over `destinations`, holding the staging lock.
fn run_purge(
    ctx: &DeployContext,
    backend: &dyn DeploymentBackend,
    game_id: &str,
    staging_path: &Path,
    destinations: &[(String, PathBuf)],
    options: &ReconcileOptions,
) -> Result<PurgeReport> {
    let pass = Pass {
        ctx,
        backend,
        game_id,
        staging_path,
        key: progress_key(game_id),
    };
    let result = manifest::with_lock(staging_path, true, || pass.run(destinations, options));
    ctx.events.progress_done(&pass.key);
    result
}

/// State of one locked purge pass.
struct Pass<'a> {
    ctx: &'a DeployContext,
    backend: &'a dyn DeploymentBackend,
    game_id: &'a str,
    staging_path: &'a Path,
    key: String,
}

impl Pass<'_> {
    fn events(&self) -> &dyn EventSink {
        self.ctx.events.as_ref()
    }

    fn scope<'s>(&'s self, target: &'s Target) -> Scope<'s> {
        Scope {
            game_id: self.game_id,
            mod_type: &target.mod_type,
            deploy_path: &target.deploy_path,
            staging_path: self.staging_path,
        }
    }

    fn run(&self, destinations: &[(String, PathBuf)], options: &ReconcileOptions) -> Result<PurgeReport> {
        self.events()
            .progress(&self.key, "checking for external changes", PHASE_DETECT);
        let mut targets = self.load_targets(destinations);
        let mut report = PurgeReport {
            game_id: self.game_id.to_string(),
            mod_types: targets
                .iter()
                .map(|t| ModTypeOutcome {
                    mod_type: t.mod_type.clone(),
                    files: t.files.len(),
                })
                .collect(),
            ..PurgeReport::default()
        };

        if self.ctx.dry_run {
            for outcome in &report.mod_types {
                self.ctx.log.dry_run(&format!(
                    "would purge {} file(s) of {}/{}",
                    outcome.files, self.game_id, outcome.mod_type
                ));
                self.ctx.log.record_task(
                    &format!("{}/{}", self.game_id, outcome.mod_type),
                    TaskStatus::DryRun,
                    Some(&format!("{} file(s)", outcome.files)),
                );
            }
            return Ok(report);
        }

        let reconciler = Reconciler {
            backend: self.backend,
            events: self.events(),
            decisions: self.ctx.decisions.as_ref(),
            fs: self.ctx.fs_ops.as_ref(),
            options,
        };
        match reconciler.run(self.game_id, self.staging_path, &mut targets) {
            Ok(summary) => report.reconcile = summary,
            Err(DeployError::UserCanceled) => return Err(DeployError::UserCanceled),
            Err(e) => return Err(self.fail(&mut targets, e)),
        }

        self.events()
            .progress(&self.key, "removing links", PHASE_REMOVE);
        match self.remove_links(&targets) {
            Ok(()) => {}
            Err(DeployError::ProcessCanceled(reason)) => {
                info!(game = self.game_id, "purge canceled: {reason}");
                self.save_verified(&mut targets)?;
                report.canceled = Some(reason);
                return Ok(report);
            }
            Err(e) => return Err(self.fail(&mut targets, e)),
        }

        self.events()
            .progress(&self.key, "saving manifest", PHASE_SAVE);
        for target in &mut targets {
            target.files.clear();
            manifest::save(
                self.scope(target),
                self.ctx.instance_id(),
                &target.files,
                self.backend.id(),
            )?;
        }

        self.events().progress(&self.key, "finishing", PHASE_NOTIFY);
        for outcome in &report.mod_types {
            self.ctx.log.record_task(
                &format!("{}/{}", self.game_id, outcome.mod_type),
                TaskStatus::Ok,
                Some(&format!("{} file(s)", outcome.files)),
            );
        }
        info!(game = self.game_id, "purge complete");
        self.events().progress(&self.key, "purge complete", PHASE_DONE);
        Ok(report)
    }

    fn load_targets(&self, destinations: &[(String, PathBuf)]) -> Vec<Target> {
        destinations
            .iter()
            .map(|(mod_type, deploy_path)| {
                let scope = Scope {
                    game_id: self.game_id,
                    mod_type,
                    deploy_path,
                    staging_path: self.staging_path,
                };
                let loaded = manifest::load(scope, self.backend.id());
                if loaded.is_foreign(self.ctx.instance_id()) {
                    warn!(
                        game = self.game_id,
                        mod_type = %mod_type,
                        instance = %loaded.instance,
                        "manifest was written by another instance"
                    );
                }
                Target {
                    mod_type: mod_type.clone(),
                    deploy_path: deploy_path.clone(),
                    files: loaded.files,
                }
            })
            .collect()
    }

    fn remove_links(&self, targets: &[Target]) -> Result<()> {
        self.backend.pre_purge(self.staging_path)?;
        let count = targets.len().max(1);
        for (index, target) in targets.iter().enumerate() {
            debug!(
                game = self.game_id,
                mod_type = %target.mod_type,
                path = %target.deploy_path.display(),
                "removing links"
            );
            let report = |percent: u8| {
                self.events().progress(
                    &self.key,
                    "removing links",
                    removal_percent(index, count, percent),
                );
            };
            self.backend
                .purge(self.staging_path, &target.deploy_path, self.game_id, &report)?;
        }
        self.backend.post_purge()
    }

    /// Keep only entries the backend still reports as deployed and save.
    /// An entry the backend cannot verify is kept unless its file is gone.
    fn save_verified(&self, targets: &mut [Target]) -> Result<()> {
        for target in targets.iter_mut() {
            let before = target.files.len();
            let deploy_path = target.deploy_path.clone();
            target.files.retain(|file| {
                self.backend
                    .is_deployed(self.staging_path, &deploy_path, file)
                    .unwrap_or_else(|e| {
                        if e.is_not_found() {
                            return false;
                        }
                        warn!("cannot verify {}: {e}", file.rel_path);
                        true
                    })
            });
            debug!(
                game = self.game_id,
                mod_type = %target.mod_type,
                kept = target.files.len(),
                dropped = before - target.files.len(),
                "saving verified manifest"
            );
            manifest::save(
                self.scope(target),
                self.ctx.instance_id(),
                &target.files,
                self.backend.id(),
            )?;
        }
        Ok(())
    }

    /// Save what is verifiably still deployed, then hand back `error`.
    fn fail(&self, targets: &mut [Target], error: DeployError) -> DeployError {
        if let Err(save_error) = self.save_verified(targets) {
            warn!(
                game = self.game_id,
                "cannot save manifest after failure: {save_error}"
            );
        }
        for target in targets.iter() {
            self.ctx.log.record_task(
                &format!("{}/{}", self.game_id, target.mod_type),
                TaskStatus::Failed,
                Some(&error.to_string()),
            );
        }
        error
    }
}

/// Overall percentage while the backend removes links of target `index`
/// out of `count`.
fn removal_percent(index: usize, count: usize, percent: u8) -> u8 {
    let span = usize::from(PHASE_SAVE - PHASE_REMOVE);
    let done = (index * 100 + usize::from(percent.min(100))) * span / (count * 100);
    u8::try_from(usize::from(PHASE_REMOVE) + done.min(span)).unwrap_or(PHASE_SAVE)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::backend::BackendRegistry;
    use crate::config::{Config, Game, ModTable, Profile, Settings};
    use crate::events::{RecordedEvent, RecordingEvents};
    use crate::logging::Logger;
    use crate::manifest::DeployedFile;
    use crate::reconcile::{ChangeKind, DecisionChannel, DecisionRequest, FileChange};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc::Receiver};

    #[derive(Debug, Clone, Copy, Default)]
    enum Failure {
        #[default]
        None,
        Cancel,
        Io,
    }

    #[derive(Debug, Default)]
    struct FakeBackend {
        failure: Failure,
        still_deployed: BTreeSet<String>,
        unverifiable: BTreeMap<String, std::io::ErrorKind>,
        changes: Vec<FileChange>,
        purges: Arc<AtomicUsize>,
    }

    impl DeploymentBackend for FakeBackend {
        fn id(&self) -> &str {
            "fake"
        }

        fn pre_purge(&self, _staging_path: &Path) -> Result<()> {
            Ok(())
        }

        fn purge(
            &self,
            _staging_path: &Path,
            deploy_path: &Path,
            _game_id: &str,
            progress: &dyn Fn(u8),
        ) -> Result<()> {
            self.purges.fetch_add(1, Ordering::SeqCst);
            progress(50);
            match self.failure {
                Failure::None => {
                    progress(100);
                    Ok(())
                }
                Failure::Cancel => Err(DeployError::ProcessCanceled("busy".into())),
                Failure::Io => Err(DeployError::io(
                    deploy_path,
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                )),
            }
        }

        fn post_purge(&self) -> Result<()> {
            Ok(())
        }

        fn is_deployed(
            &self,
            _staging_path: &Path,
            deploy_path: &Path,
            file: &DeployedFile,
        ) -> Result<bool> {
            if let Some(kind) = self.unverifiable.get(&file.rel_path) {
                return Err(DeployError::io(
                    deploy_path.join(&file.rel_path),
                    std::io::Error::from(*kind),
                ));
            }
            Ok(self.still_deployed.contains(&file.rel_path))
        }

        fn external_changes(
            &self,
            _game_id: &str,
            _staging_path: &Path,
            _deploy_path: &Path,
            _files: &[DeployedFile],
        ) -> Result<Vec<FileChange>> {
            Ok(self.changes.clone())
        }
    }

    struct Fixture {
        tmp: tempfile::TempDir,
        ctx: DeployContext,
        events: Arc<RecordingEvents>,
        log: Arc<Logger>,
        purges: Arc<AtomicUsize>,
        requests: Option<Receiver<DecisionRequest>>,
    }

    impl Fixture {
        fn staging(&self) -> PathBuf {
            self.tmp.path().join("staging")
        }

        fn deploy(&self) -> PathBuf {
            self.tmp.path().join("Data")
        }

        fn scope<'a>(&self, staging: &'a Path, deploy: &'a Path) -> Scope<'a> {
            Scope {
                game_id: "skyrim",
                mod_type: "default",
                deploy_path: deploy,
                staging_path: staging,
            }
        }

        fn manifest_files(&self) -> Vec<String> {
            let (staging, deploy) = (self.staging(), self.deploy());
            manifest::load(self.scope(&staging, &deploy), "fake")
                .files
                .into_iter()
                .map(|f| f.rel_path)
                .collect()
        }

        fn seed(&self, files: &[DeployedFile]) {
            let (staging, deploy) = (self.staging(), self.deploy());
            manifest::save(self.scope(&staging, &deploy), "local", files, "fake").unwrap();
        }
    }

    fn fixture(backend: FakeBackend, backend_id: &str, active: bool) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("staging");
        let deploy = tmp.path().join("Data");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(&deploy).unwrap();

        let game = Game {
            staging_path: staging,
            backend: backend_id.to_string(),
            case_sensitive: false,
            mod_types: [("default".to_string(), deploy)].into(),
        };
        let profile = Profile {
            id: "main".into(),
            game: "skyrim".into(),
            mods: BTreeMap::new(),
        };
        let config = Config {
            root: tmp.path().to_path_buf(),
            settings: Settings {
                active_profile: active.then(|| "main".to_string()),
                ..Settings::default()
            },
            games: [("skyrim".to_string(), game)].into(),
            profiles: [("main".to_string(), profile)].into(),
            mods: ModTable::new(),
        };

        let purges = Arc::clone(&backend.purges);
        let mut registry = BackendRegistry::new();
        registry.register(Box::new(backend));
        let events = Arc::new(RecordingEvents::new());
        let (decisions, requests) = DecisionChannel::new();
        let log = Arc::new(Logger::quiet("test"));
        let ctx = DeployContext::new(
            Arc::new(config),
            Arc::new(registry),
            Arc::clone(&events) as Arc<dyn EventSink>,
            Arc::new(decisions),
            Arc::clone(&log) as Arc<dyn crate::logging::Log>,
        );
        Fixture {
            tmp,
            ctx,
            events,
            log,
            purges,
            requests: Some(requests),
        }
    }

    fn skyrim() -> PurgeOptions {
        PurgeOptions {
            game_id: Some("skyrim".into()),
            ..PurgeOptions::default()
        }
    }

    #[test]
    fn purge_empties_manifest_and_reports_phases() {
        let fx = fixture(FakeBackend::default(), "fake", true);
        fx.seed(&[DeployedFile::new("a.esp", "modA"), DeployedFile::new("b.esp", "modB")]);

        let report = purge(&fx.ctx, &PurgeOptions::default()).unwrap();
        assert_eq!(report.game_id, "skyrim");
        assert_eq!(
            report.mod_types,
            vec![ModTypeOutcome {
                mod_type: "default".into(),
                files: 2
            }]
        );
        assert!(fx.manifest_files().is_empty());
        assert_eq!(
            fx.events.progress_for("purge-skyrim"),
            vec![0, 25, 50, 75, 75, 85, 100]
        );
        assert_eq!(
            fx.events.events().last(),
            Some(&RecordedEvent::ProgressDone {
                key: "purge-skyrim".into()
            })
        );
    }

    #[test]
    fn process_cancel_is_swallowed_and_saves_verified() {
        let backend = FakeBackend {
            failure: Failure::Cancel,
            still_deployed: ["a.esp".to_string()].into(),
            ..FakeBackend::default()
        };
        let fx = fixture(backend, "fake", true);
        fx.seed(&[DeployedFile::new("a.esp", "modA"), DeployedFile::new("b.esp", "modB")]);

        let report = purge(&fx.ctx, &skyrim()).unwrap();
        assert_eq!(report.canceled.as_deref(), Some("busy"));
        assert_eq!(fx.manifest_files(), vec!["a.esp".to_string()]);
    }

    #[test]
    fn unverifiable_entries_are_dropped_only_when_missing() {
        let backend = FakeBackend {
            failure: Failure::Cancel,
            unverifiable: [
                ("gone.esp".to_string(), std::io::ErrorKind::NotFound),
                ("locked.esp".to_string(), std::io::ErrorKind::PermissionDenied),
            ]
            .into(),
            ..FakeBackend::default()
        };
        let fx = fixture(backend, "fake", true);
        fx.seed(&[
            DeployedFile::new("gone.esp", "modA"),
            DeployedFile::new("locked.esp", "modB"),
        ]);

        let report = purge(&fx.ctx, &skyrim()).unwrap();
        assert!(report.canceled.is_some());
        assert_eq!(fx.manifest_files(), vec!["locked.esp".to_string()]);
    }

    #[test]
    fn other_errors_refilter_manifest_then_propagate() {
        let backend = FakeBackend {
            failure: Failure::Io,
            still_deployed: ["b.esp".to_string()].into(),
            ..FakeBackend::default()
        };
        let fx = fixture(backend, "fake", true);
        fx.seed(&[DeployedFile::new("a.esp", "modA"), DeployedFile::new("b.esp", "modB")]);

        let err = purge(&fx.ctx, &skyrim()).unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
        assert_eq!(fx.manifest_files(), vec!["b.esp".to_string()]);
    }

    #[test]
    fn missing_profile_is_retryable() {
        let fx = fixture(FakeBackend::default(), "fake", false);
        let err = purge(&fx.ctx, &skyrim()).unwrap_err();
        assert!(matches!(err, DeployError::NoActiveProfile(ref g) if g == "skyrim"));
        assert!(err.is_retryable());

        let unmanage = PurgeOptions {
            unmanaging: true,
            ..skyrim()
        };
        assert!(purge(&fx.ctx, &unmanage).is_ok());
    }

    #[test]
    fn purge_all_unmanages_games_with_a_manifest() {
        let fx = fixture(FakeBackend::default(), "fake", false);
        assert!(purge_all(&fx.ctx, &PurgeOptions::default()).is_empty());

        fx.seed(&[DeployedFile::new("a.esp", "modA")]);
        let results = purge_all(&fx.ctx, &PurgeOptions::default());
        assert_eq!(results.len(), 1);
        let (game_id, result) = &results[0];
        assert_eq!(game_id, "skyrim");
        assert_eq!(result.as_ref().unwrap().mod_types[0].files, 1);
        assert!(fx.manifest_files().is_empty());
        assert_eq!(fx.purges.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_backend_fails_purge_but_path_purge_falls_back() {
        let fx = fixture(FakeBackend::default(), "hardlink", true);
        std::fs::write(fx.deploy().join("a.esp"), "deployed").unwrap();
        fx.seed(&[DeployedFile::new("a.esp", "modA")]);

        let err = purge(&fx.ctx, &skyrim()).unwrap_err();
        assert!(matches!(err, DeployError::NoBackend(_)));

        let report = purge_in_path(&fx.ctx, "skyrim", "default", &fx.deploy()).unwrap();
        assert!(report.fallback);
        assert_eq!(report.mod_types[0].files, 1);
        assert!(!fx.deploy().join("a.esp").exists());
        assert!(fx.manifest_files().is_empty());
    }

    #[test]
    fn declined_confirmation_changes_nothing() {
        let backend = FakeBackend {
            changes: vec![FileChange::for_file(
                &DeployedFile::new("a.esp", "modA"),
                ChangeKind::ValChange,
            )],
            ..FakeBackend::default()
        };
        let mut fx = fixture(backend, "fake", true);
        fx.seed(&[DeployedFile::new("a.esp", "modA"), DeployedFile::new("b.esp", "modB")]);
        drop(fx.requests.take());

        let err = purge(&fx.ctx, &skyrim()).unwrap_err();
        assert!(matches!(err, DeployError::UserCanceled));
        assert_eq!(fx.manifest_files().len(), 2);
        assert_eq!(fx.purges.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn merge_output_refchange_is_dropped_without_asking() {
        let merged = DeployedFile::new("merged.esp", "__merged");
        let backend = FakeBackend {
            changes: vec![FileChange::for_file(&merged, ChangeKind::RefChange)],
            ..FakeBackend::default()
        };
        let mut fx = fixture(backend, "fake", true);
        std::fs::write(fx.deploy().join("merged.esp"), "edited").unwrap();
        fx.seed(&[merged, DeployedFile::new("b.esp", "modB")]);
        drop(fx.requests.take());

        let report = purge(&fx.ctx, &skyrim()).unwrap();
        assert_eq!(report.reconcile.automatic, 1);
        assert_eq!(report.reconcile.confirmed, 0);
        assert!(!fx.deploy().join("merged.esp").exists());
        assert!(fx.events.changed_mods().is_empty());
        assert!(fx.manifest_files().is_empty());
    }

    #[test]
    fn dry_run_leaves_everything_in_place() {
        let mut fx = fixture(FakeBackend::default(), "fake", true);
        fx.seed(&[DeployedFile::new("a.esp", "modA")]);
        fx.ctx.dry_run = true;

        let report = purge(&fx.ctx, &skyrim()).unwrap();
        assert_eq!(report.mod_types[0].files, 1);
        assert_eq!(fx.manifest_files(), vec!["a.esp".to_string()]);
        assert_eq!(fx.purges.load(Ordering::SeqCst), 0);

        let tasks = fx.log.task_entries();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "skyrim/default");
        assert_eq!(tasks[0].status, TaskStatus::DryRun);
    }

    #[test]
    fn mod_types_without_destination_are_not_applicable() {
        let mut fx = fixture(FakeBackend::default(), "fake", true);
        let mut config = (*fx.ctx.config).clone();
        config
            .games
            .get_mut("skyrim")
            .unwrap()
            .mod_types
            .insert("dinput".into(), PathBuf::new());
        fx.ctx.config = Arc::new(config);
        fx.seed(&[DeployedFile::new("a.esp", "modA")]);

        let report = purge(&fx.ctx, &skyrim()).unwrap();
        assert_eq!(report.mod_types.len(), 1);
        let tasks = fx.log.task_entries();
        let dinput = tasks.iter().find(|t| t.name == "skyrim/dinput").unwrap();
        assert_eq!(dinput.status, TaskStatus::NotApplicable);
        assert!(
            tasks
                .iter()
                .filter(|t| t.status == TaskStatus::NotApplicable)
                .all(|t| t.name == "skyrim/dinput")
        );
    }

    #[test]
    fn removal_progress_spans_its_phase() {
        assert_eq!(removal_percent(0, 1, 0), 25);
        assert_eq!(removal_percent(0, 1, 100), 75);
        assert_eq!(removal_percent(0, 2, 100), 50);
        assert_eq!(removal_percent(1, 2, 50), 62);
        assert_eq!(removal_percent(1, 2, 200), 75);
    }
}
