//! Top-level subcommand orchestration.
//!
//! Every command starts with [`CommandSetup::init`]; commands that purge
//! additionally open a [`Session`].
pub mod check;
pub mod conflicts;
pub mod purge;
pub mod purge_path;
pub mod repair;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context as _, Result};

use crate::backend::BackendRegistry;
use crate::cli::GlobalOpts;
use crate::config::{Config, Mod, Profile};
use crate::deploy::DeployContext;
use crate::error::DeployError;
use crate::events::TracingEvents;
use crate::logging::{Log, Logger};
use crate::reconcile::{AutoResolver, DecisionChannel, PromptResolver, spawn_resolver};

/// Environment variable consulted when `--root` is not given.
pub const ROOT_ENV: &str = "MODDEPLOY_ROOT";

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Loaded configuration.
    pub config: Config,
}

impl CommandSetup {
    /// Resolve the root directory and load all configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined or any
    /// configuration file fails to parse.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let root = resolve_root(global)?;
        log.debug(&format!("root: {}", root.display()));

        log.stage("Loading configuration");
        let config = Config::load(&root)?;

        let mod_count: usize = config.mods.values().map(std::collections::BTreeMap::len).sum();
        log.debug(&format!("{} profiles", config.profiles.len()));
        log.debug(&format!("instance {}", config.settings.instance_id));
        log.info(&format!(
            "loaded {} games, {mod_count} mods",
            config.games.len()
        ));
        if let Some(active) = config.settings.active_profile.as_deref()
            && !config.profiles.contains_key(active)
        {
            log.warn(&format!("active profile '{active}' is not defined"));
        }

        Ok(Self { config })
    }

    /// The game named on the command line, or the active profile's game.
    ///
    /// # Errors
    ///
    /// Returns an error if neither is available or the game is unknown.
    pub fn game_id(&self, requested: Option<&str>) -> Result<String> {
        let game_id = requested
            .or_else(|| self.config.active_game())
            .ok_or_else(|| DeployError::NoActiveProfile("(none)".to_string()))?;
        self.config.game(game_id)?;
        Ok(game_id.to_string())
    }

    /// The profile used for `game_id` and the mods it enables.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::NoActiveProfile`] if no profile manages the game.
    pub fn enabled_mods(&self, game_id: &str) -> Result<(&Profile, Vec<&Mod>)> {
        let profile = self
            .config
            .profile_for(game_id, false)
            .ok_or_else(|| DeployError::NoActiveProfile(game_id.to_string()))?;
        Ok((profile, self.config.enabled_mods(profile)))
    }
}

/// Resolve the root directory: `--root`, then `$MODDEPLOY_ROOT`, then the
/// current directory.
///
/// # Errors
///
/// Returns an error if the current directory cannot be read.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref root) = global.root {
        return Ok(root.clone());
    }
    if let Ok(root) = std::env::var(ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }
    std::env::current_dir().context("determining current directory")
}

/// A [`DeployContext`] wired to the terminal: confirmations are answered
/// by a resolver thread and Ctrl-C cancels a pending confirmation.
#[derive(Debug)]
pub struct Session {
    /// Context handed to the orchestrator.
    pub ctx: DeployContext,
    resolver: JoinHandle<()>,
}

impl Session {
    /// Build the context for `config`.
    ///
    /// With `--yes` every external change gets its default action;
    /// otherwise the user is asked on stdin.
    #[must_use]
    pub fn start(global: &GlobalOpts, config: Config, log: &Arc<Logger>) -> Self {
        let (decisions, requests) = DecisionChannel::new();
        let resolver = if global.yes {
            spawn_resolver(requests, AutoResolver)
        } else {
            spawn_resolver(requests, PromptResolver::stdio())
        };

        let cancel = decisions.cancel_handle();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            log.debug(&format!("Ctrl-C handler not installed: {e}"));
        }

        let log = Arc::clone(log) as Arc<dyn Log>;
        let ctx = DeployContext::new(
            Arc::new(config),
            Arc::new(BackendRegistry::with_builtin()),
            Arc::new(TracingEvents::new(Arc::clone(&log))),
            Arc::new(decisions),
            log,
        )
        .with_dry_run(global.dry_run);

        Self { ctx, resolver }
    }

    /// Close the decision channel, print the summary and bail if anything
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns an error if one or more units of work recorded a failure.
    pub fn finish(self, log: &Logger) -> Result<()> {
        drop(self.ctx);
        if self.resolver.join().is_err() {
            log.warn("decision resolver thread panicked");
        }

        log.print_summary();

        let count = log.failure_count();
        if count > 0 {
            anyhow::bail!("{count} purge(s) failed");
        }
        Ok(())
    }
}
