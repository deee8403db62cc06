//! Check command: the soft gate run before the game is started.
use std::io::{self, BufReader};
use std::sync::Arc;

use anyhow::{Result, bail};

use super::CommandSetup;
use super::conflicts::conflict_map;
use crate::cli::{CheckOpts, GlobalOpts};
use crate::config::Mod;
use crate::conflicts::ConflictCache;
use crate::logging::{Log, Logger};
use crate::rules::{
    GateChoice, GatePrompt, GateReport, RuleGraph, TerminalGatePrompt, find_cycle, find_cycles, map_rules,
    pre_run_check, run_gate,
};

/// Run the check command.
///
/// Findings never block on their own: the user either proceeds or asks
/// for the repair view, which fails the command so a launcher does not
/// start the game.
///
/// # Errors
///
/// Returns an error if configuration loading fails, no profile manages the
/// game, or the user chose to repair.
pub fn run(global: &GlobalOpts, opts: &CheckOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let game_id = setup.game_id(opts.game.as_deref())?;
    let (enabled, map) = conflict_map(&setup, &game_id, &mut ConflictCache::new())?;

    log.stage(&format!("Checking {game_id}"));
    let report = pre_run_check(&map, &enabled, &map_rules(enabled.iter().copied()));
    let cycles = report_cycles(log.as_ref(), &enabled);

    let mut terminal = TerminalGatePrompt::new(BufReader::new(io::stdin()), io::stdout());
    let prompt: Option<&mut dyn GatePrompt> = (!global.yes).then_some(&mut terminal);
    let choice = gate(log.as_ref(), &report, cycles, prompt);

    if choice == GateChoice::Repair {
        bail!("start aborted; use `moddeploy conflicts` and `moddeploy repair` to fix");
    }
    Ok(())
}

/// Log every ordering cycle among `enabled` with one concrete loop each.
/// Returns the number of cycles.
fn report_cycles(log: &dyn Log, enabled: &[&Mod]) -> usize {
    let graph = RuleGraph::build(enabled);
    let clusters = find_cycles(&graph);
    for cluster in &clusters {
        log.warn(&format!("rule cycle among {}", cluster.join(", ")));
        if let Some(edges) = cluster.first().and_then(|first| find_cycle(&graph, first)) {
            for edge in edges {
                log.info(&format!("  {edge}"));
            }
        }
    }
    clusters.len()
}

/// Summarize the findings, then ask how to continue. Without a prompt the
/// start proceeds.
fn gate(
    log: &dyn Log,
    report: &GateReport,
    cycles: usize,
    prompt: Option<&mut dyn GatePrompt>,
) -> GateChoice {
    summarize(log, report, cycles);
    prompt.map_or(GateChoice::Proceed, |p| run_gate(report, p))
}

fn summarize(log: &dyn Log, report: &GateReport, cycles: usize) {
    if report.is_clear() && cycles == 0 {
        log.info("no unresolved conflicts, incompatibilities or cycles");
        return;
    }
    for pair in &report.unresolved {
        log.warn(&format!("unresolved: {} <-> {}", pair.mod_id, pair.other));
    }
    for (a, b) in &report.incompatible {
        log.warn(&format!("incompatible: {a} x {b}"));
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::mods::test_mod;
    use crate::logging::TaskStatus;
    use crate::rules::{RuleType, UnresolvedPair};
    use parking_lot::Mutex;

    type Transcript = Arc<Mutex<Vec<String>>>;

    struct TranscriptLog(Transcript);

    impl Log for TranscriptLog {
        fn stage(&self, _msg: &str) {}
        fn info(&self, msg: &str) {
            self.0.lock().push(format!("info: {msg}"));
        }
        fn debug(&self, _msg: &str) {}
        fn warn(&self, msg: &str) {
            self.0.lock().push(format!("warn: {msg}"));
        }
        fn error(&self, _msg: &str) {}
        fn dry_run(&self, _msg: &str) {}
        fn record_task(&self, _name: &str, _status: TaskStatus, _message: Option<&str>) {}
        fn progress(&self, _key: &str, _text: &str, _percent: u8) {}
        fn finish_progress(&self, _key: &str) {}
    }

    struct TranscriptPrompt(Transcript, GateChoice);

    impl GatePrompt for TranscriptPrompt {
        fn choose(&mut self, _report: &GateReport) -> GateChoice {
            self.0.lock().push("prompt".to_string());
            self.1
        }
    }

    fn conflicted() -> GateReport {
        GateReport {
            unresolved: vec![UnresolvedPair {
                mod_id: "A".into(),
                other: "B".into(),
                files: vec!["a.esp".into()],
            }],
            incompatible: vec![],
        }
    }

    #[test]
    fn findings_are_listed_before_the_prompt() {
        let transcript = Transcript::default();
        let log = TranscriptLog(Arc::clone(&transcript));
        let mut prompt = TranscriptPrompt(Arc::clone(&transcript), GateChoice::Repair);

        let choice = gate(&log, &conflicted(), 0, Some(&mut prompt));
        assert_eq!(choice, GateChoice::Repair);
        assert_eq!(
            *transcript.lock(),
            vec!["warn: unresolved: A <-> B".to_string(), "prompt".to_string()]
        );
    }

    #[test]
    fn without_prompt_the_start_proceeds() {
        let transcript = Transcript::default();
        let log = TranscriptLog(Arc::clone(&transcript));
        assert_eq!(gate(&log, &conflicted(), 0, None), GateChoice::Proceed);
        assert_eq!(transcript.lock().len(), 1);
    }

    #[test]
    fn cycles_are_counted() {
        let log = Logger::quiet("test");
        let a = test_mod("A").with_rule(RuleType::After, "B");
        let b = test_mod("B").with_rule(RuleType::After, "C");
        let c = test_mod("C").with_rule(RuleType::After, "A");
        let d = test_mod("D");
        assert_eq!(report_cycles(&log, &[&a, &b, &c, &d]), 1);
        assert_eq!(report_cycles(&log, &[&a, &b, &d]), 0);
    }
}
