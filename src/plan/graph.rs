//! File-level dependency graph, cycle detection, and projection onto groups.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use crate::error::{CycleLevel, PlanError};
use crate::inventory::{FileInventory, normalize_path};

/// Caller-supplied relation: each key depends on every path in its value set.
pub type DependencyRelation = BTreeMap<String, BTreeSet<String>>;

/// Group-level edge: `from` must merge before `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: usize,
    pub to: usize,
}

/// Directed graph over inventory paths. An edge `a -> b` means `a` must land before `b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph from an optional relation. Entries naming paths outside
    /// the inventory and self-dependencies are ignored.
    pub fn build(inventory: &FileInventory, relation: Option<&DependencyRelation>) -> Self {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = inventory
            .paths()
            .map(|p| (p.to_string(), BTreeSet::new()))
            .collect();

        for (dependent, prerequisites) in relation.into_iter().flatten() {
            let dependent = normalize_path(dependent);
            if !inventory.contains(&dependent) {
                continue;
            }
            for prerequisite in prerequisites {
                let prerequisite = normalize_path(prerequisite);
                if prerequisite == dependent || !inventory.contains(&prerequisite) {
                    continue;
                }
                if let Some(targets) = adjacency.get_mut(&prerequisite) {
                    targets.insert(dependent.clone());
                }
            }
        }

        Self { adjacency }
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    /// All edges as `(prerequisite, dependent)` pairs in lexical order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.adjacency
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    /// Every dependency cycle, as sorted member lists, ordered by first member.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = strongly_connected(&self.adjacency)
            .into_iter()
            .filter(|component| component.len() > 1)
            .collect();
        cycles.sort();
        cycles
    }

    /// Fail if any cycle has members in more than one group.
    ///
    /// A cycle kept whole inside one group is harmless: it lands in a single PR.
    pub fn check_placement(&self, group_of: &BTreeMap<String, usize>) -> Result<(), PlanError> {
        for cycle in self.cycles() {
            let groups: BTreeSet<usize> = cycle
                .iter()
                .filter_map(|path| group_of.get(path).copied())
                .collect();
            if groups.len() > 1 {
                return Err(PlanError::CyclicDependency {
                    level: CycleLevel::File,
                    nodes: cycle,
                });
            }
        }
        Ok(())
    }

    /// Collapse file edges into group edges, dropping edges inside a group.
    pub fn project(&self, group_of: &BTreeMap<String, usize>) -> BTreeSet<DependencyEdge> {
        self.edges()
            .filter_map(|(from, to)| {
                let from = *group_of.get(from)?;
                let to = *group_of.get(to)?;
                (from != to).then_some(DependencyEdge { from, to })
            })
            .collect()
    }
}

/// Strongly connected components, each sorted. Nodes that only appear as
/// neighbors are included.
pub(crate) fn strongly_connected<N: Ord + Clone>(
    adjacency: &BTreeMap<N, BTreeSet<N>>,
) -> Vec<Vec<N>> {
    let nodes: Vec<&N> = adjacency
        .iter()
        .flat_map(|(from, tos)| std::iter::once(from).chain(tos))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut graph = DiGraphMap::<usize, ()>::with_capacity(nodes.len(), 0);
    for idx in 0..nodes.len() {
        graph.add_node(idx);
    }
    for (from, tos) in adjacency {
        let Ok(from) = nodes.binary_search(&from) else {
            continue;
        };
        for to in tos {
            if let Ok(to) = nodes.binary_search(&to) {
                graph.add_edge(from, to, ());
            }
        }
    }

    kosaraju_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut members: Vec<N> = component.into_iter().map(|idx| nodes[idx].clone()).collect();
            members.sort();
            members
        })
        .collect()
}
