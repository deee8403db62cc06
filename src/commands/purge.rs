//! Purge command implementation.
use std::sync::Arc;

use anyhow::Result;

use super::{CommandSetup, Session};
use crate::cli::{GlobalOpts, PurgeOpts};
use crate::deploy::{self, PurgeOptions, PurgeReport};
use crate::error::{self, DeployError};
use crate::logging::{Log, Logger, TaskStatus};

/// Run the purge command.
///
/// A declined external-change confirmation is reported and is not a
/// failure.
///
/// # Errors
///
/// Returns an error if configuration loading fails, no game can be
/// resolved, or any purge failed.
pub fn run(global: &GlobalOpts, opts: &PurgeOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let options = PurgeOptions {
        game_id: opts.game.clone(),
        unmanaging: opts.unmanage,
        removing: opts.removing.iter().cloned().collect(),
        batch_install_active: false,
    };

    let session = Session::start(global, setup.config, log);
    let outcome = if opts.all {
        log.stage("Purging all games");
        for (game_id, result) in deploy::purge_all(&session.ctx, &options) {
            if let Err(e) = handle(log.as_ref(), &game_id, result) {
                log.error(&format!("{game_id}: {e}"));
            }
        }
        Ok(())
    } else {
        let game_id = target_label(&options, &session);
        log.stage(&format!("Purging {game_id}"));
        handle(log.as_ref(), &game_id, deploy::purge(&session.ctx, &options))
    };
    let finished = session.finish(log);
    outcome.and(finished)
}

fn target_label(options: &PurgeOptions, session: &Session) -> String {
    options
        .game_id
        .as_deref()
        .or_else(|| session.ctx.config.active_game())
        .unwrap_or("(none)")
        .to_string()
}

/// Log the outcome of one game's purge.
pub(super) fn handle(
    log: &dyn Log,
    game_id: &str,
    result: error::Result<PurgeReport>,
) -> Result<()> {
    match result {
        Ok(report) => {
            describe(log, &report);
            Ok(())
        }
        Err(DeployError::UserCanceled) => {
            log.warn(&format!("{game_id}: purge canceled, nothing was changed"));
            log.record_task(game_id, TaskStatus::Skipped, Some("canceled"));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(log: &dyn Log, report: &PurgeReport) {
    let files: usize = report.mod_types.iter().map(|t| t.files).sum();
    if let Some(reason) = &report.canceled {
        log.warn(&format!(
            "{}: purge stopped early ({reason}); the manifest lists what is still deployed",
            report.game_id
        ));
        return;
    }
    let detected = report.reconcile.detected;
    if detected > 0 {
        log.info(&format!(
            "{}: {detected} external change(s), {} applied automatically, {} confirmed",
            report.game_id, report.reconcile.automatic, report.reconcile.confirmed
        ));
    }
    let how = if report.fallback { " from manifest" } else { "" };
    log.info(&format!(
        "{}: purged {files} file(s){how} across {} mod type(s)",
        report.game_id,
        report.mod_types.len()
    ));
}
