//! Edits that break ordering loops.
//!
//! All operations work on one game's mod table and change authored rules in
//! place; persisting the table is up to the caller.
use std::collections::BTreeMap;

use thiserror::Error;

use super::cycle::Edge;
use super::reference::ModReference;
use super::rule::{Rule, RuleType};
use crate::config::Mod;

/// Why a repair could not be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    /// A mod id is not installed.
    #[error("unknown mod '{0}'")]
    UnknownMod(String),
    /// No authored rule produces the edge.
    #[error("no ordering rule makes '{from}' load after '{to}'")]
    NoRule {
        /// Later mod of the edge.
        from: String,
        /// Earlier mod of the edge.
        to: String,
    },
}

/// Reverse the rule behind `edge` so `edge.to` loads after `edge.from`.
///
/// The rule is rewritten on the mod that authored it (`from after to`
/// becomes `from before to`, `to before from` becomes `to after from`).
/// Returns the number of rules rewritten.
///
/// # Errors
///
/// Returns [`RepairError`] if either mod is unknown or no rule produces
/// `edge`.
pub fn flip_rule(mods: &mut BTreeMap<String, Mod>, edge: &Edge) -> Result<usize, RepairError> {
    edit_edge(mods, edge, |rule| {
        if let Some(inverse) = rule.rule_type.inverse() {
            rule.rule_type = inverse;
        }
        true
    })
}

/// Delete the rule behind `edge`. Returns the number of rules removed.
///
/// # Errors
///
/// Returns [`RepairError`] if either mod is unknown or no rule produces
/// `edge`.
pub fn remove_rule(mods: &mut BTreeMap<String, Mod>, edge: &Edge) -> Result<usize, RepairError> {
    edit_edge(mods, edge, |_| false)
}

/// Make `selected` load after every mod of `cluster` it used to precede.
///
/// Strips every authored rule placing `selected` before another member of
/// `cluster` (its own `before` rules and the others' `after` rules naming
/// it) and adds one `after` rule on `selected` per mod it preceded.
/// Returns the number of rules added.
///
/// # Errors
///
/// Returns [`RepairError::UnknownMod`] if `selected` is not installed.
pub fn load_last(
    mods: &mut BTreeMap<String, Mod>,
    selected: &str,
    cluster: &[String],
) -> Result<usize, RepairError> {
    let sel = mods
        .get(selected)
        .cloned()
        .ok_or_else(|| RepairError::UnknownMod(selected.to_string()))?;
    let members: Vec<Mod> = cluster
        .iter()
        .filter(|id| id.as_str() != selected)
        .filter_map(|id| mods.get(id).cloned())
        .collect();

    // dest mod id -> reference for the new rule
    let mut preceded: BTreeMap<String, ModReference> = BTreeMap::new();

    if let Some(owner) = mods.get_mut(selected) {
        owner.rules.retain(|rule| {
            if rule.rule_type != RuleType::Before {
                return true;
            }
            let Some(m) = members.iter().find(|m| rule.reference.matches(m)) else {
                return true;
            };
            preceded
                .entry(m.id.clone())
                .or_insert_with(|| rule.reference.clone());
            false
        });
    }
    for member in &members {
        if let Some(other) = mods.get_mut(&member.id) {
            let before = other.rules.len();
            other
                .rules
                .retain(|rule| !(rule.rule_type == RuleType::After && rule.reference.matches(&sel)));
            if other.rules.len() != before {
                preceded
                    .entry(member.id.clone())
                    .or_insert_with(|| ModReference::by_id(&member.id));
            }
        }
    }

    let added = preceded.len();
    if let Some(owner) = mods.get_mut(selected) {
        owner.rules.extend(
            preceded
                .into_values()
                .map(|reference| Rule::new(RuleType::After, reference)),
        );
        dedup_rules(&mut owner.rules);
    }
    Ok(added)
}

/// Apply `keep` to every authored rule producing `edge`; rules for which it
/// returns `false` are removed.
fn edit_edge(
    mods: &mut BTreeMap<String, Mod>,
    edge: &Edge,
    mut keep: impl FnMut(&mut Rule) -> bool,
) -> Result<usize, RepairError> {
    let from = mods
        .get(&edge.from)
        .cloned()
        .ok_or_else(|| RepairError::UnknownMod(edge.from.clone()))?;
    let to = mods
        .get(&edge.to)
        .cloned()
        .ok_or_else(|| RepairError::UnknownMod(edge.to.clone()))?;

    let mut edited = 0usize;
    for (owner, other, rule_type) in [
        (&from, &to, RuleType::After),
        (&to, &from, RuleType::Before),
    ] {
        let Some(m) = mods.get_mut(&owner.id) else {
            continue;
        };
        m.rules.retain_mut(|rule| {
            if rule.rule_type != rule_type || !rule.reference.matches(other) {
                return true;
            }
            edited += 1;
            keep(rule)
        });
        dedup_rules(&mut m.rules);
    }

    if edited == 0 {
        return Err(RepairError::NoRule {
            from: edge.from.clone(),
            to: edge.to.clone(),
        });
    }
    Ok(edited)
}

/// Drop repeated rules, keeping the first occurrence.
fn dedup_rules(rules: &mut Vec<Rule>) {
    let mut seen = Vec::with_capacity(rules.len());
    rules.retain(|rule| {
        if seen.contains(rule) {
            false
        } else {
            seen.push(rule.clone());
            true
        }
    });
}
