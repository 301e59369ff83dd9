//! Split plan generation.
//!
//! The pipeline is: inventory -> modules -> dependency graph -> partition ->
//! assemble (validate coverage, order groups). Every step is pure and
//! deterministic, so identical requests produce identical plans.

pub mod assemble;
pub mod describe;
pub mod graph;
pub mod modules;
pub mod order;
pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::inventory::{Classifier, FileInput, FileInventory, PathFilter, SizeFallback};

pub use assemble::{PlanSummary, SplitGroup, SplitPlan};
pub use describe::{DescribeOptions, DescribedPlan, GroupDescription, describe_plan};
pub use graph::{DependencyEdge, DependencyGraph, DependencyRelation};
pub use modules::{Module, ModuleMap, ROOT_MODULE, detect_modules};
pub use strategy::{Bucket, Partition, PartitionInput, Strategy};

fn default_base_branch() -> String {
    "main".to_string()
}

/// Input to [`generate_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub files: Vec<FileInput>,
    #[serde(alias = "targetCount", alias = "target_pr_count")]
    pub target_count: usize,
    pub strategy: String,
    /// Each key depends on the paths in its set.
    #[serde(default, alias = "dependencyRelation")]
    pub dependencies: Option<DependencyRelation>,
    #[serde(default = "default_base_branch", alias = "baseBranch")]
    pub base_branch: String,
}

/// Tuning that is not part of the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    /// Directory segments (below the shared root) that identify a module.
    pub module_depth: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub size_fallback: SizeFallback,
    pub classifier: Classifier,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            module_depth: 1,
            include: Vec::new(),
            exclude: Vec::new(),
            size_fallback: SizeFallback::Zero,
            classifier: Classifier::default(),
        }
    }
}

/// Build a split plan for the request.
pub fn generate_plan(request: &PlanRequest, config: &PlanConfig) -> Result<SplitPlan, PlanError> {
    if request.target_count < 1 {
        return Err(PlanError::InvalidTargetCount(request.target_count));
    }
    let strategy: Strategy = request.strategy.parse()?;

    let filter = PathFilter::new(&config.include, &config.exclude)?;
    let inventory = FileInventory::from_inputs(&request.files, &filter)?;

    let modules = detect_modules(&inventory, config.module_depth.max(1), request.dependencies.as_ref());
    let inventory = inventory.with_modules(modules.labels());
    let graph = DependencyGraph::build(&inventory, request.dependencies.as_ref());

    let input = PartitionInput {
        inventory: &inventory,
        modules: &modules,
        classifier: &config.classifier,
        size_fallback: config.size_fallback,
    };
    let buckets = strategy.partitioner().partition(&input, request.target_count);

    assemble::assemble(
        &inventory,
        &graph,
        buckets,
        strategy,
        &request.base_branch,
        request.target_count,
    )
}
