// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed root with `conf/`, a staging
// directory and a destination directory, plus helpers that deploy staged
// files as symlinks and record them in a manifest the way a deployment
// would.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use moddeploy::backend::{BackendRegistry, SymlinkBackend};
use moddeploy::config::Config;
use moddeploy::deploy::DeployContext;
use moddeploy::events::RecordingEvents;
use moddeploy::logging::Logger;
use moddeploy::manifest::{self, DeployedFile, Scope};
use moddeploy::reconcile::{
    AutoResolver, DecisionChannel, DecisionReply, FileEntry, Resolver, spawn_resolver,
};

/// Game id used by every fixture.
pub const GAME: &str = "skyrim";

/// Settings, one game with a `default` mod type, and a profile enabling
/// mods `A` and `B`.
pub fn setup_minimal_root(root: &Path) {
    let conf = root.join("conf");
    std::fs::create_dir_all(&conf).expect("create conf dir");
    std::fs::create_dir_all(root.join("staging")).expect("create staging dir");
    std::fs::create_dir_all(root.join("game/Data")).expect("create destination dir");

    std::fs::write(
        conf.join("settings.toml"),
        "instance_id = \"test\"\nactive_profile = \"main\"\n",
    )
    .expect("write settings.toml");
    std::fs::write(
        conf.join("games.toml"),
        "[skyrim]\nstaging_path = \"staging\"\n\n[skyrim.mod_types]\ndefault = \"game/Data\"\n",
    )
    .expect("write games.toml");
    std::fs::write(
        conf.join("profiles.toml"),
        "[main]\ngame = \"skyrim\"\nmods = { A = true, B = true }\n",
    )
    .expect("write profiles.toml");
    std::fs::write(
        conf.join("mods.toml"),
        "[skyrim.A]\ninstallation_path = \"A\"\n\n[skyrim.B]\ninstallation_path = \"B\"\n",
    )
    .expect("write mods.toml");
}

/// Resolver that accepts defaults and counts how often it was asked.
#[derive(Debug, Clone, Default)]
pub struct CountingResolver(pub Arc<AtomicUsize>);

impl Resolver for CountingResolver {
    fn resolve(&mut self, game_id: &str, changes: Vec<FileEntry>) -> DecisionReply {
        self.0.fetch_add(1, Ordering::SeqCst);
        AutoResolver.resolve(game_id, changes)
    }
}

/// An isolated root backed by a [`tempfile::TempDir`].
pub struct TestRoot {
    /// Temporary directory holding `conf/`, `staging/` and `game/Data/`.
    pub root: tempfile::TempDir,
}

impl TestRoot {
    /// Create a root with the minimal configuration.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        setup_minimal_root(root.path());
        Self { root }
    }

    /// Path to the root.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Staging directory of the game.
    pub fn staging(&self) -> PathBuf {
        self.root.path().join("staging")
    }

    /// Destination of the `default` mod type.
    pub fn data(&self) -> PathBuf {
        self.root.path().join("game/Data")
    }

    /// Overwrite `conf/<filename>`.
    pub fn with_config_file(self, filename: &str, content: &str) -> Self {
        std::fs::write(self.root.path().join("conf").join(filename), content)
            .expect("write config file");
        self
    }

    /// Create `staging/<source>/<rel>` with `content`.
    pub fn stage(&self, source: &str, rel: &str, content: &str) -> PathBuf {
        let path = self.staging().join(source).join(rel);
        std::fs::create_dir_all(path.parent().expect("staged file has a parent"))
            .expect("create staged parent");
        std::fs::write(&path, content).expect("write staged file");
        path
    }

    /// Load the configuration.
    pub fn load_config(&self) -> Config {
        Config::load(self.root.path()).expect("load config")
    }

    /// Scope of the `default` mod type's manifest.
    pub fn with_scope<T>(&self, f: impl FnOnce(Scope<'_>) -> T) -> T {
        let staging = self.staging();
        let data = self.data();
        f(Scope {
            game_id: GAME,
            mod_type: "default",
            deploy_path: &data,
            staging_path: &staging,
        })
    }

    /// Link every staged file of `sources` into the destination and record
    /// the links in the manifest.
    #[cfg(unix)]
    pub fn deploy(&self, sources: &[&str]) -> Vec<DeployedFile> {
        let mut files = Vec::new();
        for source in sources {
            let dir = self.staging().join(source);
            for entry in walkdir::WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let rel = entry
                    .path()
                    .strip_prefix(&dir)
                    .expect("entry below source")
                    .to_string_lossy()
                    .replace('\\', "/");
                let link = self.data().join(&rel);
                std::fs::create_dir_all(link.parent().expect("link has a parent"))
                    .expect("create link parent");
                std::os::unix::fs::symlink(entry.path(), &link).expect("create link");
                files.push(DeployedFile::new(rel, *source));
            }
        }
        self.with_scope(|scope| {
            manifest::save(scope, "test", &files, SymlinkBackend::ID).expect("save manifest")
        });
        files
    }

    /// Entries of the `default` manifest.
    pub fn manifest_files(&self) -> Vec<DeployedFile> {
        self.with_scope(|scope| manifest::load(scope, SymlinkBackend::ID).files)
    }

    /// A context over the symlink backend. Confirmations are accepted with
    /// default actions and counted in the returned counter.
    pub fn context(&self) -> (DeployContext, Arc<RecordingEvents>, Arc<AtomicUsize>) {
        let (decisions, requests) = DecisionChannel::new();
        let asked = Arc::new(AtomicUsize::new(0));
        spawn_resolver(requests, CountingResolver(Arc::clone(&asked)));

        let events = Arc::new(RecordingEvents::new());
        let ctx = DeployContext::new(
            Arc::new(self.load_config()),
            Arc::new(BackendRegistry::with_builtin()),
            events.clone(),
            Arc::new(decisions),
            Arc::new(Logger::quiet("test")),
        );
        (ctx, events, asked)
    }
}
