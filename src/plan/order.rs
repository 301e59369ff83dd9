//! Merge ordering of groups.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CycleLevel, PlanError};

use super::graph::{DependencyEdge, strongly_connected};

/// Topologically sort group ids so every edge's `from` precedes its `to`.
///
/// Kahn's algorithm with the ready set drained in ascending id order, so
/// the result is the lexicographically smallest valid order. Edges naming
/// ids outside `group_ids` are ignored.
pub fn merge_order(
    group_ids: &[usize],
    edges: &BTreeSet<DependencyEdge>,
) -> Result<Vec<usize>, PlanError> {
    let ids: BTreeSet<usize> = group_ids.iter().copied().collect();
    let mut successors: BTreeMap<usize, BTreeSet<usize>> =
        ids.iter().map(|id| (*id, BTreeSet::new())).collect();
    let mut in_degree: BTreeMap<usize, usize> = ids.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        if edge.from == edge.to || !ids.contains(&edge.from) || !ids.contains(&edge.to) {
            continue;
        }
        if successors.entry(edge.from).or_default().insert(edge.to) {
            *in_degree.entry(edge.to).or_default() += 1;
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(ids.len());

    while let Some(id) = ready.pop_first() {
        order.push(id);
        for next in successors.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*next);
                }
            }
        }
    }

    if order.len() == ids.len() {
        return Ok(order);
    }

    let placed: BTreeSet<usize> = order.into_iter().collect();
    let remaining: BTreeMap<usize, BTreeSet<usize>> = successors
        .into_iter()
        .filter(|(id, _)| !placed.contains(id))
        .map(|(id, next)| (id, next.into_iter().filter(|n| !placed.contains(n)).collect()))
        .collect();

    let mut cyclic: Vec<usize> = strongly_connected(&remaining)
        .into_iter()
        .filter(|component| component.len() > 1)
        .flatten()
        .collect();
    if cyclic.is_empty() {
        cyclic = remaining.keys().copied().collect();
    }
    cyclic.sort_unstable();

    Err(PlanError::CyclicDependency {
        level: CycleLevel::Group,
        nodes: cyclic.iter().map(|id| id.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(usize, usize)]) -> BTreeSet<DependencyEdge> {
        pairs
            .iter()
            .map(|(from, to)| DependencyEdge { from: *from, to: *to })
            .collect()
    }

    #[test]
    fn test_no_edges_keeps_id_order() {
        assert_eq!(merge_order(&[3, 1, 2], &BTreeSet::new()), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn test_dependency_goes_first() {
        let order = merge_order(&[1, 2, 3], &edges(&[(3, 1), (2, 1)])).unwrap();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_independent_groups_lowest_id_first() {
        let order = merge_order(&[1, 2, 3, 4], &edges(&[(4, 2)])).unwrap();
        assert_eq!(order, vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_cycle_reported_with_members() {
        let err = merge_order(&[1, 2, 3, 4], &edges(&[(2, 3), (3, 2), (1, 4)])).unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                level: CycleLevel::Group,
                nodes: vec!["2".to_string(), "3".to_string()],
            }
        );
        assert_eq!(err.to_string(), "Cyclic group-level dependency between: 2, 3");
    }
}
