//! Conflicts command: list file conflicts and the pairs no rule decides.
use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::{ConflictsOpts, GlobalOpts};
use crate::config::Mod;
use crate::conflicts::{Blacklist, ConflictCache, ConflictMap};
use crate::logging::{Log, Logger};
use crate::rules::{RuleType, map_rules, unresolved_conflicts};

/// Run the conflicts command.
///
/// # Errors
///
/// Returns an error if configuration loading fails or no profile manages
/// the game.
pub fn run(global: &GlobalOpts, opts: &ConflictsOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let game_id = setup.game_id(opts.game.as_deref())?;
    let (enabled, map) = conflict_map(&setup, &game_id, &mut ConflictCache::new())?;

    log.stage(&format!("Conflicts in {game_id}"));
    report_conflicts(log.as_ref(), &map);

    let rules = map_rules(enabled.iter().copied());
    let unresolved = unresolved_conflicts(&map, &enabled, &rules, opts.all);
    if unresolved.is_empty() {
        log.info("every conflict is decided by a rule");
    }
    for pair in &unresolved {
        log.warn(&format!(
            "no rule between {} and {} ({} file(s))",
            pair.mod_id,
            pair.other,
            pair.files.len()
        ));
    }
    Ok(())
}

/// Enabled mods of `game_id` and their conflict map.
///
/// # Errors
///
/// Returns an error if no profile manages the game.
pub(super) fn conflict_map<'a>(
    setup: &'a CommandSetup,
    game_id: &str,
    cache: &mut ConflictCache,
) -> Result<(Vec<&'a Mod>, Arc<ConflictMap>)> {
    let game = setup.config.game(game_id)?;
    let (_, enabled) = setup.enabled_mods(game_id)?;
    let map = cache.get(
        &game.staging_path,
        &enabled,
        game.case_sensitive,
        &Blacklist::default(),
    );
    Ok((enabled, map))
}

/// Log each conflicting pair once, with the age-based suggestion if any.
fn report_conflicts(log: &dyn Log, map: &ConflictMap) {
    let mut pairs = 0usize;
    for (mod_id, conflicts) in map {
        for conflict in conflicts.iter().filter(|c| mod_id < &c.other) {
            pairs += 1;
            let hint = match conflict.suggestion {
                Some(rule @ (RuleType::After | RuleType::Before)) => {
                    format!(" (suggest: {mod_id} {rule} {})", conflict.other)
                }
                _ => String::new(),
            };
            log.info(&format!(
                "{mod_id} <-> {}: {} file(s){hint}",
                conflict.other,
                conflict.files.len()
            ));
            for file in &conflict.files {
                log.debug(&format!("  {file}"));
            }
        }
    }
    if pairs == 0 {
        log.info("no file conflicts");
    }
}
