//! Conflicting pairs that no rule decides.
use std::collections::{BTreeMap, BTreeSet};

use super::rule::{BiDirRule, find_rule_bidir};
use crate::config::Mod;
use crate::conflicts::ConflictMap;

/// A conflicting pair without a rule between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPair {
    /// Mod the conflict was found under.
    pub mod_id: String,
    /// The other mod.
    pub other: String,
    /// Shared files.
    pub files: Vec<String>,
}

/// Order-independent key for a pair of mod ids.
#[must_use]
pub fn pair_key<'a>(lhs: &'a str, rhs: &'a str) -> (&'a str, &'a str) {
    if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) }
}

/// Scan `conflicts` for pairs lacking a bidirectional rule.
///
/// Each pair is reported once, under the mod that sorts first in the map.
/// Unless `show_all` is set the scan stops at the first hit. Conflicts
/// naming a mod not in `mods` are ignored.
#[must_use]
pub fn unresolved_conflicts(
    conflicts: &ConflictMap,
    mods: &[&Mod],
    rules: &[BiDirRule],
    show_all: bool,
) -> Vec<UnresolvedPair> {
    let by_id: BTreeMap<&str, &Mod> = mods.iter().map(|m| (m.id.as_str(), *m)).collect();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for (mod_id, list) in conflicts {
        let Some(lhs) = by_id.get(mod_id.as_str()) else {
            continue;
        };
        for conflict in list {
            let Some(rhs) = by_id.get(conflict.other.as_str()) else {
                continue;
            };
            if !seen.insert(pair_key(mod_id, &conflict.other)) {
                continue;
            }
            if find_rule_bidir(rules, lhs, rhs).is_some() {
                continue;
            }
            out.push(UnresolvedPair {
                mod_id: mod_id.clone(),
                other: conflict.other.clone(),
                files: conflict.files.clone(),
            });
            if !show_all {
                return out;
            }
        }
    }
    out
}
