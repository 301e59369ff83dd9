//! Plan types and assembly of partition buckets into a validated plan.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PlanError;
use crate::inventory::record::saturating_total;
use crate::inventory::{FileInventory, FileRecord};

use super::graph::{DependencyEdge, DependencyGraph};
use super::order::merge_order;
use super::strategy::{Bucket, Strategy};

/// One proposed pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SplitGroup {
    /// 1-based, dense, stable within a plan.
    pub id: usize,
    pub label: String,
    /// Member files, path-sorted.
    pub files: Vec<FileRecord>,
    /// Groups that must merge before this one.
    #[serde(default)]
    pub depends_on: BTreeSet<usize>,
}

impl SplitGroup {
    /// Sum of member line counts.
    pub fn estimated_lines(&self) -> u64 {
        saturating_total(self.files.iter().map(|f| f.line_count))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

impl Serialize for SplitGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SplitGroup", 6)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("file_count", &self.file_count())?;
        state.serialize_field("estimated_lines", &self.estimated_lines())?;
        state.serialize_field("depends_on", &self.depends_on)?;
        state.serialize_field("files", &self.files)?;
        state.end()
    }
}

/// Aggregate statistics, always derived from the groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub group_count: usize,
    pub total_files: usize,
    pub total_lines: u64,
    pub avg_files_per_group: f64,
    pub avg_lines_per_group: f64,
    pub max_group_files: usize,
    pub max_group_lines: u64,
}

/// A complete split plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SplitPlan {
    pub strategy: Strategy,
    pub base_branch: String,
    pub target_count: usize,
    pub groups: Vec<SplitGroup>,
    /// Permutation of group ids consistent with every dependency.
    pub merge_order: Vec<usize>,
}

impl SplitPlan {
    pub fn group(&self, id: usize) -> Option<&SplitGroup> {
        id.checked_sub(1)
            .and_then(|idx| self.groups.get(idx))
            .filter(|g| g.id == id)
            .or_else(|| self.groups.iter().find(|g| g.id == id))
    }

    /// Groups in merge order.
    pub fn ordered_groups(&self) -> impl Iterator<Item = &SplitGroup> {
        self.merge_order.iter().filter_map(|id| self.group(*id))
    }

    /// 1-based position of a group in the merge order.
    pub fn position_of(&self, id: usize) -> Option<usize> {
        self.merge_order.iter().position(|g| *g == id).map(|p| p + 1)
    }

    /// Group-level edges implied by `depends_on`.
    pub fn edges(&self) -> BTreeSet<DependencyEdge> {
        self.groups
            .iter()
            .flat_map(|g| g.depends_on.iter().map(|from| DependencyEdge { from: *from, to: g.id }))
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let group_count = self.groups.len();
        let total_files: usize = self.groups.iter().map(SplitGroup::file_count).sum();
        let total_lines = saturating_total(self.groups.iter().map(SplitGroup::estimated_lines));
        let divisor = group_count.max(1) as f64;

        PlanSummary {
            group_count,
            total_files,
            total_lines,
            avg_files_per_group: total_files as f64 / divisor,
            avg_lines_per_group: total_lines as f64 / divisor,
            max_group_files: self.groups.iter().map(SplitGroup::file_count).max().unwrap_or(0),
            max_group_lines: self
                .groups
                .iter()
                .map(SplitGroup::estimated_lines)
                .max()
                .unwrap_or(0),
        }
    }
}

impl Serialize for SplitPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SplitPlan", 6)?;
        state.serialize_field("strategy", &self.strategy)?;
        state.serialize_field("base_branch", &self.base_branch)?;
        state.serialize_field("target_count", &self.target_count)?;
        state.serialize_field("summary", &self.summary())?;
        state.serialize_field("merge_order", &self.merge_order)?;
        state.serialize_field("groups", &self.groups)?;
        state.end()
    }
}

/// Turn buckets into a plan, checking coverage, bounds, and ordering.
pub fn assemble(
    inventory: &FileInventory,
    graph: &DependencyGraph,
    buckets: Vec<Bucket>,
    strategy: Strategy,
    base_branch: &str,
    target_count: usize,
) -> Result<SplitPlan, PlanError> {
    if buckets.len() > target_count || buckets.len() > inventory.len() {
        return Err(PlanError::InconsistentPlan(format!(
            "{} groups for {} files with target {}",
            buckets.len(),
            inventory.len(),
            target_count
        )));
    }

    let mut group_of: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, bucket) in buckets.iter().enumerate() {
        let id = idx + 1;
        if bucket.files.is_empty() {
            return Err(PlanError::InconsistentPlan(format!("group {id} is empty")));
        }
        for path in &bucket.files {
            if !inventory.contains(path) {
                return Err(PlanError::InconsistentPlan(format!(
                    "group {id} contains unknown file {path}"
                )));
            }
            if let Some(previous) = group_of.insert(path.clone(), id) {
                return Err(PlanError::InconsistentPlan(format!(
                    "{path} assigned to groups {previous} and {id}"
                )));
            }
        }
    }
    if group_of.len() != inventory.len() {
        let missing: Vec<&str> = inventory
            .paths()
            .filter(|p| !group_of.contains_key(*p))
            .collect();
        return Err(PlanError::InconsistentPlan(format!(
            "files not assigned to any group: {}",
            missing.join(", ")
        )));
    }

    graph.check_placement(&group_of)?;
    let edges = graph.project(&group_of);
    let ids: Vec<usize> = (1..=buckets.len()).collect();
    let merge_order = merge_order(&ids, &edges)?;

    let groups = buckets
        .into_iter()
        .enumerate()
        .map(|(idx, bucket)| {
            let id = idx + 1;
            let mut paths = bucket.files;
            paths.sort();
            SplitGroup {
                id,
                label: bucket.label,
                files: paths
                    .iter()
                    .filter_map(|p| inventory.get(p))
                    .cloned()
                    .collect(),
                depends_on: edges.iter().filter(|e| e.to == id).map(|e| e.from).collect(),
            }
        })
        .collect();

    Ok(SplitPlan {
        strategy,
        base_branch: base_branch.to_string(),
        target_count,
        groups,
        merge_order,
    })
}
