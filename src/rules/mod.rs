//! Authored rules between mods and what they resolve.
//!
//! Rules reference mods fuzzily ([`ModReference`]) and can be read from
//! either endpoint ([`BiDirRule`]). On top of that this module answers
//! three questions: which conflicting pairs have no rule yet
//! ([`unresolved`]), whether the ordering rules loop ([`cycle`]), and how to
//! fix a loop ([`repair`]). [`gate`] bundles the first answer into the soft
//! check run before the game starts.
pub mod cycle;
pub mod gate;
pub mod reference;
pub mod repair;
pub mod rule;
pub mod unresolved;

pub use cycle::{Edge, RuleGraph, find_cycle, find_cycles};
pub use gate::{GateChoice, GatePrompt, GateReport, TerminalGatePrompt, pre_run_check, run_gate};
pub use reference::{ModReference, sanitize_expression};
pub use repair::{RepairError, flip_rule, load_last, remove_rule};
pub use rule::{BiDirRule, Rule, RuleType, find_rule, find_rule_bidir, map_rules};
pub use unresolved::{UnresolvedPair, pair_key, unresolved_conflicts};
