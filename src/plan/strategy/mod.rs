//! Partition strategies.
//!
//! Each strategy turns the inventory into at most `target` non-empty buckets
//! that together cover every file exactly once. Buckets come back in the
//! order the strategy wants them numbered.

mod balanced;
mod by_file;
mod by_module;
mod by_type;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::inventory::{Classifier, FileInventory, FileRecord, SizeFallback};

use super::modules::ModuleMap;

pub use balanced::Balanced;
pub use by_file::ByFile;
pub use by_module::ByModule;
pub use by_type::ByType;

pub(crate) use balanced::balance;

/// Available split strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ByModule,
    ByFile,
    ByType,
    Balanced,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::ByModule,
        Strategy::ByFile,
        Strategy::ByType,
        Strategy::Balanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ByModule => "by_module",
            Strategy::ByFile => "by_file",
            Strategy::ByType => "by_type",
            Strategy::Balanced => "balanced",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Strategy::ByModule => "Split by directory/module structure",
            Strategy::ByFile => "Split files evenly across groups in path order",
            Strategy::ByType => "Split by file type (config, source, tests, docs)",
            Strategy::Balanced => "Balance estimated lines of change across groups",
        }
    }

    pub fn use_case(self) -> &'static str {
        match self {
            Strategy::ByModule => "Best for well-organized codebases with clear module boundaries",
            Strategy::ByFile => "Best when files are independent and order does not matter",
            Strategy::ByType => "Best for changes that touch infrastructure, code and docs together",
            Strategy::Balanced => "Best for keeping every PR a similar review size",
        }
    }

    pub fn partitioner(self) -> &'static dyn Partition {
        match self {
            Strategy::ByModule => &ByModule,
            Strategy::ByFile => &ByFile,
            Strategy::ByType => &ByType,
            Strategy::Balanced => &Balanced,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| PlanError::InvalidStrategy(s.to_string()))
    }
}

/// Everything a strategy may look at.
pub struct PartitionInput<'a> {
    pub inventory: &'a FileInventory,
    pub modules: &'a ModuleMap,
    pub classifier: &'a Classifier,
    pub size_fallback: SizeFallback,
}

impl PartitionInput<'_> {
    pub fn weight(&self, record: &FileRecord) -> u64 {
        record.weight(self.size_fallback)
    }

    pub(crate) fn weighted_paths<'r>(
        &self,
        records: impl IntoIterator<Item = &'r FileRecord>,
    ) -> Vec<(String, u64)> {
        records
            .into_iter()
            .map(|r| (r.path.clone(), self.weight(r)))
            .collect()
    }
}

/// One proposed group: a label and its member paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub label: String,
    pub files: Vec<String>,
}

/// A partitioning algorithm.
pub trait Partition: Send + Sync {
    /// Produce between 1 and `target` buckets. `target` is at least 1.
    fn partition(&self, input: &PartitionInput<'_>, target: usize) -> Vec<Bucket>;
}

/// A mergeable unit used by strategies that start from natural groupings
/// (modules, categories) and must shrink to a target count.
#[derive(Debug, Clone)]
pub(crate) struct Candidate<T> {
    /// Position in emission order. Merged candidates keep the lowest.
    pub rank: usize,
    pub members: Vec<T>,
    pub files: Vec<String>,
    pub weight: u64,
}

impl<T> Candidate<T> {
    fn absorb(&mut self, other: Candidate<T>) {
        self.rank = self.rank.min(other.rank);
        self.members.extend(other.members);
        self.files.extend(other.files);
        self.files.sort();
        self.weight = self.weight.saturating_add(other.weight);
    }
}

/// Repeatedly fold the lightest candidate into the one closest to it in
/// weight until at most `target` remain. Ties go to the lower rank.
/// Returns candidates sorted by rank.
pub(crate) fn merge_to_target<T>(mut candidates: Vec<Candidate<T>>, target: usize) -> Vec<Candidate<T>> {
    while candidates.len() > target.max(1) {
        let Some(lightest) = (0..candidates.len())
            .min_by_key(|&i| (candidates[i].weight, candidates[i].rank))
        else {
            break;
        };
        let absorbed = candidates.remove(lightest);

        let Some(nearest) = (0..candidates.len()).min_by_key(|&i| {
            (
                candidates[i].weight.abs_diff(absorbed.weight),
                candidates[i].rank,
            )
        }) else {
            candidates.push(absorbed);
            break;
        };
        candidates[nearest].absorb(absorbed);
    }

    candidates.sort_by_key(|c| c.rank);
    candidates
}
