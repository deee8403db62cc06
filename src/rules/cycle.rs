//! Load-order graph built from `before`/`after` rules, and cycle search.
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use super::rule::RuleType;
use crate::config::Mod;

/// A directed edge: `from` loads after `to`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    /// Mod that loads later.
    pub from: String,
    /// Mod that loads earlier.
    pub to: String,
}

impl Edge {
    /// Build an edge.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Ordering graph over a cluster of mods.
///
/// `A after B` and `B before A` both produce the edge `A -> B`. Rules whose
/// reference matches no mod of the cluster are ignored.
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    ids: Vec<String>,
    index: BTreeMap<String, usize>,
    successors: Vec<BTreeSet<usize>>,
}

impl RuleGraph {
    /// Build the graph for `mods`.
    #[must_use]
    pub fn build(mods: &[&Mod]) -> Self {
        let ids: Vec<String> = mods.iter().map(|m| m.id.clone()).collect();
        let index: BTreeMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let mut successors = vec![BTreeSet::new(); mods.len()];

        for (owner_idx, owner) in mods.iter().enumerate() {
            for rule in owner.rules.iter().filter(|r| r.rule_type.is_ordering()) {
                for (other_idx, other) in mods.iter().enumerate() {
                    if other_idx == owner_idx || !rule.reference.matches(other) {
                        continue;
                    }
                    let (from, to) = match rule.rule_type {
                        RuleType::After => (owner_idx, other_idx),
                        _ => (other_idx, owner_idx),
                    };
                    if let Some(set) = successors.get_mut(from) {
                        set.insert(to);
                    }
                }
            }
        }

        Self {
            ids,
            index,
            successors,
        }
    }

    /// Number of mods in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` if the graph has no mods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Every edge, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (from, set) in self.successors.iter().enumerate() {
            for to in set {
                if let (Some(f), Some(t)) = (self.ids.get(from), self.ids.get(*to)) {
                    edges.push(Edge::new(f.clone(), t.clone()));
                }
            }
        }
        edges.sort();
        edges
    }

    /// Mods `id` loads directly after.
    pub fn successors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> {
        self.index
            .get(id)
            .and_then(|i| self.successors.get(*i))
            .into_iter()
            .flatten()
            .filter_map(|i| self.ids.get(*i).map(String::as_str))
    }

    /// `true` if any ordering loop exists (Kahn's algorithm).
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut in_degree = vec![0usize; self.len()];
        for set in &self.successors {
            for to in set {
                if let Some(d) = in_degree.get_mut(*to) {
                    *d += 1;
                }
            }
        }

        let mut queue: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut processed = 0usize;

        while let Some(idx) = queue.pop() {
            processed += 1;
            for next in self.successors.get(idx).into_iter().flatten() {
                if let Some(count) = in_degree.get_mut(*next) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push(*next);
                    }
                }
            }
        }

        processed != self.len()
    }

    /// Shortest path from `start` to `goal`, as node indices including both.
    fn shortest_path(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let mut previous: BTreeMap<usize, usize> = BTreeMap::new();
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == goal {
                let mut path = vec![goal];
                let mut cur = goal;
                while let Some(prev) = previous.get(&cur) {
                    path.push(*prev);
                    cur = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.successors.get(node).into_iter().flatten() {
                if visited.insert(*next) {
                    previous.insert(*next, node);
                    queue.push_back(*next);
                }
            }
        }
        None
    }

    /// Every node reachable from `start`, including `start`.
    fn reachable(&self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for next in self.successors.get(node).into_iter().flatten() {
                if seen.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        seen
    }
}

/// Find a loop through `selected`.
///
/// Searches the shortest path back to `selected` from each of its direct
/// successors in turn and returns the first closed path as its edges,
/// starting at `selected`. `None` if `selected` is unknown or on no loop.
#[must_use]
pub fn find_cycle(graph: &RuleGraph, selected: &str) -> Option<Vec<Edge>> {
    let goal = *graph.index.get(selected)?;
    graph
        .successors
        .get(goal)?
        .iter()
        .find_map(|first| graph.shortest_path(*first, goal))
        .map(|tail| {
            std::iter::once(goal)
                .chain(tail)
                .collect::<Vec<_>>()
                .windows(2)
                .filter_map(|w| match w {
                    [from, to] => Some(Edge::new(
                        graph.ids.get(*from)?.clone(),
                        graph.ids.get(*to)?.clone(),
                    )),
                    _ => None,
                })
                .collect()
        })
}

/// Clusters of mods whose ordering rules loop, each sorted by id.
///
/// A cluster is a set of mutually reachable mods with at least one edge
/// between them.
#[must_use]
pub fn find_cycles(graph: &RuleGraph) -> Vec<Vec<String>> {
    let reach: Vec<BTreeSet<usize>> = (0..graph.len()).map(|i| graph.reachable(i)).collect();
    let mut assigned = BTreeSet::new();
    let mut clusters = Vec::new();

    for (i, from_i) in reach.iter().enumerate() {
        if assigned.contains(&i) {
            continue;
        }
        let members: Vec<usize> = from_i
            .iter()
            .copied()
            .filter(|j| reach.get(*j).is_some_and(|r| r.contains(&i)))
            .collect();
        let looped = members.len() > 1
            || graph.successors.get(i).is_some_and(|s| s.contains(&i));
        assigned.extend(members.iter().copied());
        if looped {
            let mut ids: Vec<String> = members
                .iter()
                .filter_map(|j| graph.ids.get(*j).cloned())
                .collect();
            ids.sort();
            clusters.push(ids);
        }
    }
    clusters
}
