//! Deployment backends.
//!
//! A backend knows how files are made visible in a destination directory
//! (links, copies, ...). The engine only talks to it through
//! [`DeploymentBackend`]; concrete strategies are registered in a
//! [`BackendRegistry`] and chosen per game by id.
pub mod symlink;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::error::{DeployError, Result};
use crate::manifest::DeployedFile;
use crate::reconcile::FileChange;

pub use symlink::SymlinkBackend;

/// Contract between the engine and a deployment strategy.
pub trait DeploymentBackend: Send + Sync + std::fmt::Debug {
    /// Stable identifier, stored in manifests.
    fn id(&self) -> &str;

    /// Prepare for purging everything deployed from `staging_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ProcessCanceled`] if the backend cannot
    /// proceed right now, or any other failure.
    fn pre_purge(&self, staging_path: &Path) -> Result<()>;

    /// Remove everything deployed from `staging_path` into `deploy_path`.
    /// `progress` receives the completed percentage of this call.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ProcessCanceled`] if the backend cannot
    /// proceed right now, or the first removal failure.
    fn purge(
        &self,
        staging_path: &Path,
        deploy_path: &Path,
        game_id: &str,
        progress: &dyn Fn(u8),
    ) -> Result<()>;

    /// Finish a purge started with [`pre_purge`](Self::pre_purge).
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn post_purge(&self) -> Result<()>;

    /// Returns `true` if `file` is still deployed.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be inspected.
    fn is_deployed(&self, staging_path: &Path, deploy_path: &Path, file: &DeployedFile)
    -> Result<bool>;

    /// Compare `files` with the destination and staging directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be inspected.
    fn external_changes(
        &self,
        game_id: &str,
        staging_path: &Path,
        deploy_path: &Path,
        files: &[DeployedFile],
    ) -> Result<Vec<FileChange>>;
}

/// Backends by id.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn DeploymentBackend>>,
}

impl BackendRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in backend.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SymlinkBackend::new()));
        registry
    }

    /// Add `backend`, replacing one with the same id.
    pub fn register(&mut self, backend: Box<dyn DeploymentBackend>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    /// Look up a backend by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn DeploymentBackend> {
        self.backends.get(id).map(AsRef::as_ref)
    }

    /// Backend configured for `game_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::NoBackend`] if `backend_id` is not registered.
    pub fn for_game(&self, game_id: &str, backend_id: &str) -> Result<&dyn DeploymentBackend> {
        self.get(backend_id).ok_or_else(|| {
            warn!(
                game = game_id,
                backend = backend_id,
                registered = ?self.ids().collect::<Vec<_>>(),
                "backend is not registered"
            );
            DeployError::NoBackend(game_id.to_string())
        })
    }

    /// Registered ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}
