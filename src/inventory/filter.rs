//! Include/exclude glob filtering.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::PlanError;

use super::record::file_name;

/// Glob filter applied before planning.
///
/// A path is kept when it matches at least one include pattern (or no include
/// patterns were given) and matches no exclude pattern. Each pattern is tested
/// against the full path and against the bare file name, so `*.lock` works
/// at any depth.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, PlanError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    pub fn allows(&self, path: &str) -> bool {
        let name = file_name(path);
        let matches = |set: &GlobSet| set.is_match(path) || set.is_match(name);

        if self.include.as_ref().is_some_and(|set| !matches(set)) {
            return false;
        }
        !self.exclude.as_ref().is_some_and(matches)
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>, PlanError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| PlanError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.kind().to_string(),
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| PlanError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })
}
