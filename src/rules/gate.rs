//! Soft check run before the game is started.
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use tracing::{debug, warn};

use super::rule::{BiDirRule, RuleType};
use super::unresolved::{UnresolvedPair, pair_key, unresolved_conflicts};
use crate::config::Mod;
use crate::conflicts::ConflictMap;

/// What the pre-run check found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateReport {
    /// Conflicting pairs without a rule.
    pub unresolved: Vec<UnresolvedPair>,
    /// Enabled pairs linked by a `conflicts` rule, as sorted id pairs.
    pub incompatible: Vec<(String, String)>,
}

impl GateReport {
    /// `true` if there is nothing to warn about.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.unresolved.is_empty() && self.incompatible.is_empty()
    }
}

/// The user's answer to a non-clear report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChoice {
    /// Start anyway.
    Proceed,
    /// Open the repair view instead of starting.
    Repair,
}

/// Asks the user what to do about a non-clear report.
pub trait GatePrompt {
    /// Choose how to continue.
    fn choose(&mut self, report: &GateReport) -> GateChoice;
}

/// Collect unresolved conflicts and incompatibilities among `enabled`.
#[must_use]
pub fn pre_run_check(conflicts: &ConflictMap, enabled: &[&Mod], rules: &[BiDirRule]) -> GateReport {
    let unresolved = unresolved_conflicts(conflicts, enabled, rules, true);

    let mut incompatible = BTreeSet::new();
    for m in enabled {
        for rule in m.rules.iter().filter(|r| r.rule_type == RuleType::Conflicts) {
            for other in enabled
                .iter()
                .filter(|o| o.id != m.id && rule.reference.matches(o))
            {
                let (a, b) = pair_key(&m.id, &other.id);
                incompatible.insert((a.to_string(), b.to_string()));
            }
        }
    }

    let report = GateReport {
        unresolved,
        incompatible: incompatible.into_iter().collect(),
    };
    debug!(
        unresolved = report.unresolved.len(),
        incompatible = report.incompatible.len(),
        "pre-run check finished"
    );
    report
}

/// Decide whether to start. A clear report proceeds without asking.
#[must_use]
pub fn run_gate(report: &GateReport, prompt: &mut dyn GatePrompt) -> GateChoice {
    if report.is_clear() {
        return GateChoice::Proceed;
    }
    warn!(
        "{} unresolved conflict(s), {} incompatible pair(s)",
        report.unresolved.len(),
        report.incompatible.len()
    );
    prompt.choose(report)
}

/// Terminal prompt: lists the findings and asks `proceed` or `repair`.
///
/// Anything other than an explicit `r`/`repair` proceeds, so a closed
/// input never blocks the start.
#[derive(Debug)]
pub struct TerminalGatePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalGatePrompt<R, W> {
    /// Prompt on `input`/`output`.
    #[must_use]
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn render(&mut self, report: &GateReport) -> std::io::Result<()> {
        if !report.unresolved.is_empty() {
            writeln!(
                self.output,
                "Unresolved file conflicts: pick which mod loads last."
            )?;
            for pair in &report.unresolved {
                writeln!(
                    self.output,
                    "  {} <-> {} ({} file(s))",
                    pair.mod_id,
                    pair.other,
                    pair.files.len()
                )?;
            }
        }
        if !report.incompatible.is_empty() {
            writeln!(self.output, "Incompatible mods enabled together:")?;
            for (a, b) in &report.incompatible {
                writeln!(self.output, "  {a} x {b}")?;
            }
        }
        write!(self.output, "[p]roceed anyway / [r]epair: ")?;
        self.output.flush()
    }
}

impl<R: BufRead, W: Write> GatePrompt for TerminalGatePrompt<R, W> {
    fn choose(&mut self, report: &GateReport) -> GateChoice {
        if let Err(e) = self.render(report) {
            warn!("cannot show pre-run prompt: {e}");
            return GateChoice::Proceed;
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) if matches!(line.trim().to_lowercase().as_str(), "r" | "repair") => {
                GateChoice::Repair
            }
            _ => GateChoice::Proceed,
        }
    }
}
