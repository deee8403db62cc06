//! Repair command: edit authored rules to break ordering cycles.
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, RepairAction, RepairOpts};
use crate::config::{Config, Mod};
use crate::logging::{Log, Logger};
use crate::rules::{Edge, RuleGraph, find_cycle, find_cycles, flip_rule, load_last, remove_rule};

/// Run the repair command and write `mods.toml` if any rule changed.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the edit does not
/// apply, or `mods.toml` cannot be written.
pub fn run(global: &GlobalOpts, opts: &RepairOpts, log: &Arc<Logger>) -> Result<()> {
    let mut setup = CommandSetup::init(global, log.as_ref())?;
    let game_id = setup.game_id(opts.game.as_deref())?;

    log.stage(&format!("Repairing rules of {game_id}"));
    let changed = apply(&mut setup.config, &game_id, &opts.action, log.as_ref())?;
    if changed == 0 {
        return Ok(());
    }
    let path = setup.config.mods_path();
    if global.dry_run {
        log.dry_run(&format!("would write {}", path.display()));
        return Ok(());
    }
    setup.config.save_mods()?;
    log.info(&format!("wrote {}", path.display()));
    Ok(())
}

/// Apply `action` to the rules of `game_id`. Returns how many rules changed.
fn apply(config: &mut Config, game_id: &str, action: &RepairAction, log: &dyn Log) -> Result<usize> {
    match action {
        RepairAction::Cycle { mod_id } => {
            let mods: Vec<&Mod> = config.mods_for(game_id).collect();
            match find_cycle(&RuleGraph::build(&mods), mod_id) {
                Some(edges) => {
                    for edge in edges {
                        log.info(&format!("{edge}"));
                    }
                }
                None => log.info(&format!("'{mod_id}' is not on a rule cycle")),
            }
            Ok(0)
        }
        RepairAction::Flip { from, to } => {
            let edge = Edge::new(from.as_str(), to.as_str());
            let changed = flip_rule(game_mods(config, game_id), &edge)?;
            log.info(&format!("{to} now loads after {from}"));
            Ok(changed)
        }
        RepairAction::Remove { from, to } => {
            let edge = Edge::new(from.as_str(), to.as_str());
            let changed = remove_rule(game_mods(config, game_id), &edge)?;
            log.info(&format!("removed {edge}"));
            Ok(changed)
        }
        RepairAction::LoadLast { mod_id } => {
            let mods: Vec<&Mod> = config.mods_for(game_id).collect();
            let cluster = find_cycles(&RuleGraph::build(&mods))
                .into_iter()
                .find(|c| c.contains(mod_id))
                .with_context(|| format!("'{mod_id}' is not on a rule cycle"))?;
            let added = load_last(game_mods(config, game_id), mod_id, &cluster)?;
            log.info(&format!(
                "{mod_id} now loads after {}",
                cluster
                    .iter()
                    .filter(|id| *id != mod_id)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            Ok(added)
        }
    }
}

fn game_mods<'a>(config: &'a mut Config, game_id: &str) -> &'a mut BTreeMap<String, Mod> {
    config.mods.entry(game_id.to_string()).or_default()
}
