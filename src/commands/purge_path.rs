//! Purge-path command implementation.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};

use super::{CommandSetup, Session};
use crate::cli::{GlobalOpts, PurgePathOpts};
use crate::config::Config;
use crate::deploy;
use crate::logging::Logger;

/// Run the purge-path command.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the mod type has no
/// destination, or the purge failed.
pub fn run(global: &GlobalOpts, opts: &PurgePathOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let game_id = setup.game_id(Some(&opts.game))?;
    let deploy_path = destination(&setup.config, &game_id, &opts.mod_type, opts.path.as_ref())?;

    let session = Session::start(global, setup.config, log);
    log.stage(&format!(
        "Purging {game_id}/{} in {}",
        opts.mod_type,
        deploy_path.display()
    ));
    let result = deploy::purge_in_path(&session.ctx, &game_id, &opts.mod_type, &deploy_path);
    let outcome = super::purge::handle(log.as_ref(), &game_id, result);
    let finished = session.finish(log);
    outcome.and(finished)
}

/// The explicit path, or the mod type's configured destination.
fn destination(
    config: &Config,
    game_id: &str,
    mod_type: &str,
    explicit: Option<&PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    let game = config.game(game_id)?;
    match game.mod_types.get(mod_type) {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
        Some(_) => bail!("mod type '{mod_type}' of '{game_id}' has no destination"),
        None => bail!("unknown mod type '{mod_type}' for game '{game_id}'"),
    }
}
