//! Authored rules and their bidirectional view.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::reference::ModReference;
use crate::config::mods::Mod;

/// Kind of relation a rule expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// The owning mod loads before the referenced mod.
    Before,
    /// The owning mod loads after the referenced mod.
    After,
    /// The owning mod needs the referenced mod.
    Requires,
    /// The owning mod works better with the referenced mod.
    Recommends,
    /// The two mods are incompatible.
    Conflicts,
    /// The owning mod provides what the referenced mod provides.
    Provides,
}

impl RuleType {
    /// The relation as seen from the other endpoint, if it has one.
    ///
    /// `requires`, `recommends` and `provides` are one-way and return `None`.
    #[must_use]
    pub const fn inverse(self) -> Option<Self> {
        match self {
            Self::Before => Some(Self::After),
            Self::After => Some(Self::Before),
            Self::Conflicts => Some(Self::Conflicts),
            Self::Requires | Self::Recommends | Self::Provides => None,
        }
    }

    /// `true` for `before` and `after`.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Before | Self::After)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Requires => "requires",
            Self::Recommends => "recommends",
            Self::Conflicts => "conflicts",
            Self::Provides => "provides",
        };
        f.write_str(s)
    }
}

/// A rule as authored on a mod: `<owner> <type> <reference>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Relation type.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// The other endpoint.
    pub reference: ModReference,
}

impl Rule {
    /// Build a rule.
    #[must_use]
    pub const fn new(rule_type: RuleType, reference: ModReference) -> Self {
        Self {
            rule_type,
            reference,
        }
    }
}

/// A rule seen from either endpoint.
///
/// Every authored `before`/`after`/`conflicts` rule produces two of these:
/// the authored direction (`original == true`) and its inverse stored from
/// the referenced mod's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiDirRule {
    /// Endpoint the rule is read from.
    pub source: ModReference,
    /// Relation as seen from `source`.
    pub rule_type: RuleType,
    /// Endpoint the rule points at.
    pub reference: ModReference,
    /// `true` if this is the direction the user authored.
    pub original: bool,
}

impl BiDirRule {
    /// The rule as it is stored on its authoring mod.
    #[must_use]
    pub fn authored(&self) -> (ModReference, Rule) {
        if self.original {
            (
                self.source.clone(),
                Rule::new(self.rule_type, self.reference.clone()),
            )
        } else {
            let authored_type = self.rule_type.inverse().unwrap_or(self.rule_type);
            (
                self.reference.clone(),
                Rule::new(authored_type, self.source.clone()),
            )
        }
    }
}

/// Build the bidirectional rule set for `mods`.
///
/// One-way rule types are skipped.
#[must_use]
pub fn map_rules<'a>(mods: impl IntoIterator<Item = &'a Mod>) -> Vec<BiDirRule> {
    let mut out = Vec::new();
    for m in mods {
        let source = ModReference::by_id(&m.id);
        for rule in &m.rules {
            let Some(inverse) = rule.rule_type.inverse() else {
                continue;
            };
            out.push(BiDirRule {
                source: source.clone(),
                rule_type: rule.rule_type,
                reference: rule.reference.clone(),
                original: true,
            });
            out.push(BiDirRule {
                source: rule.reference.clone(),
                rule_type: inverse,
                reference: source.clone(),
                original: false,
            });
        }
    }
    out
}

/// Find a rule authored on `lhs` whose reference matches `rhs`.
#[must_use]
pub fn find_rule<'a>(lhs: &'a Mod, rhs: &Mod) -> Option<&'a Rule> {
    lhs.rules.iter().find(|r| r.reference.matches(rhs))
}

/// Find a bidirectional rule linking `lhs` and `rhs` in either direction.
///
/// Returns the rule oriented from `lhs`'s point of view, with `original`
/// telling whether `lhs` is the authoring side.
#[must_use]
pub fn find_rule_bidir<'a>(rules: &'a [BiDirRule], lhs: &Mod, rhs: &Mod) -> Option<&'a BiDirRule> {
    rules
        .iter()
        .find(|r| r.source.matches(lhs) && r.reference.matches(rhs))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::mods::test_mod;

    #[test]
    fn inverse_pairs() {
        assert_eq!(RuleType::Before.inverse(), Some(RuleType::After));
        assert_eq!(RuleType::After.inverse(), Some(RuleType::Before));
        assert_eq!(RuleType::Conflicts.inverse(), Some(RuleType::Conflicts));
        assert_eq!(RuleType::Requires.inverse(), None);
    }

    #[test]
    fn map_rules_skips_one_way_types() {
        let a = test_mod("a")
            .with_rule(RuleType::Requires, "b")
            .with_rule(RuleType::Provides, "c");
        assert!(map_rules([&a]).is_empty());
    }

    #[test]
    fn map_rules_emits_both_directions() {
        let a = test_mod("a").with_rule(RuleType::Before, "b");
        let rules = map_rules([&a]);
        assert_eq!(rules.len(), 2);
        assert!(rules[0].original);
        assert_eq!(rules[0].rule_type, RuleType::Before);
        assert!(!rules[1].original);
        assert_eq!(rules[1].rule_type, RuleType::After);
        assert_eq!(rules[1].source, ModReference::by_id("b"));
    }

    #[test]
    fn find_rule_is_directional() {
        let a = test_mod("a").with_rule(RuleType::Before, "b");
        let b = test_mod("b");
        assert!(find_rule(&a, &b).is_some());
        assert!(find_rule(&b, &a).is_none());
    }

    #[test]
    fn bidir_lookup_is_symmetric() {
        let a = test_mod("a").with_rule(RuleType::Before, "b");
        let b = test_mod("b");
        let c = test_mod("c");
        let rules = map_rules([&a, &b, &c]);

        let ab = find_rule_bidir(&rules, &a, &b).expect("a->b");
        let ba = find_rule_bidir(&rules, &b, &a).expect("b->a");
        assert!(ab.original);
        assert!(!ba.original);
        assert_eq!(ba.rule_type, RuleType::After);

        assert!(find_rule_bidir(&rules, &a, &c).is_none());
        assert!(find_rule_bidir(&rules, &c, &a).is_none());
    }

    #[test]
    fn authored_restores_owner() {
        let a = test_mod("a").with_rule(RuleType::Before, "b");
        let rules = map_rules([&a]);
        let (owner, rule) = rules[1].authored();
        assert_eq!(owner, ModReference::by_id("a"));
        assert_eq!(rule, Rule::new(RuleType::Before, ModReference::by_id("b")));
    }
}
