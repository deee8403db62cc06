//! Collaborators shared by every orchestrator operation.
use std::sync::Arc;

use crate::backend::BackendRegistry;
use crate::config::Config;
use crate::events::EventSink;
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::reconcile::DecisionChannel;

/// Shared state for purge operations.
pub struct DeployContext {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Available deployment backends.
    pub backends: Arc<BackendRegistry>,
    /// Receiver of notifications and progress.
    pub events: Arc<dyn EventSink>,
    /// Where external-change confirmations are sent.
    pub decisions: Arc<DecisionChannel>,
    /// Filesystem used when applying reconciliation actions and falling
    /// back to manifest-driven purges.
    pub fs_ops: Arc<dyn FileSystemOps>,
    /// Logger for summaries and dry-run output.
    pub log: Arc<dyn Log>,
    /// Report what would be purged without changing anything.
    pub dry_run: bool,
}

impl std::fmt::Debug for DeployContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployContext")
            .field("root", &self.config.root)
            .field("backends", &self.backends)
            .field("events", &self.events)
            .field("decisions", &self.decisions)
            .field("fs_ops", &self.fs_ops)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DeployContext {
    /// Create a context using the real filesystem.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        backends: Arc<BackendRegistry>,
        events: Arc<dyn EventSink>,
        decisions: Arc<DecisionChannel>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self {
            config,
            backends,
            events,
            decisions,
            fs_ops: Arc::new(SystemFileSystemOps),
            log,
            dry_run: false,
        }
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Id of this application instance.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.config.settings.instance_id
    }
}
