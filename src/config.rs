//! Layered configuration: defaults, then `.splitpr.toml`, then `SPLITPR_*`
//! environment variables. CLI flags are applied last by the binary.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use toml_edit::{DocumentMut, Item};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::inventory::{Classifier, FileCategory, SizeFallback};
use crate::plan::{DescribeOptions, PlanConfig};

/// Config file looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = ".splitpr.toml";

const ENV_REMOTE: &str = "SPLITPR_REMOTE";
const ENV_BASE_BRANCH: &str = "SPLITPR_BASE_BRANCH";
const ENV_STRATEGY: &str = "SPLITPR_STRATEGY";
const ENV_TARGET_COUNT: &str = "SPLITPR_TARGET_COUNT";
const ENV_BRANCH_PREFIX: &str = "SPLITPR_BRANCH_PREFIX";
const ENV_MAX_PARALLEL: &str = "SPLITPR_MAX_PARALLEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub remote: String,
    pub base_branch: String,
    pub strategy: String,
    pub target_count: usize,
    pub branch_prefix: String,
    pub title_prefix: String,
    pub module_depth: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Enables the byte-size weight fallback for zero-line files.
    pub bytes_per_line: Option<u64>,
    pub max_parallel: usize,
    /// Base each branch on the previous one in merge order.
    pub chain: bool,
    pub draft: bool,
    /// Extension (without dot) to category overrides.
    pub categories: BTreeMap<String, FileCategory>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            base_branch: "main".to_string(),
            strategy: "by_module".to_string(),
            target_count: 5,
            branch_prefix: "split".to_string(),
            title_prefix: "Split PR".to_string(),
            module_depth: 1,
            include: Vec::new(),
            exclude: Vec::new(),
            bytes_per_line: None,
            max_parallel: 4,
            chain: false,
            draft: true,
            categories: BTreeMap::new(),
        }
    }
}

impl SplitConfig {
    /// Defaults, overlaid with `<dir>/.splitpr.toml` if present, then the environment.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            config.apply_file(&path)?;
        } else {
            debug!("No {} found in {}", CONFIG_FILE_NAME, dir.display());
        }
        config.apply_env();
        Ok(config)
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!("Loading config from {}", path.display());
        self.apply_toml(&content, &path.display().to_string())
    }

    /// Overlay values from TOML text. Unknown keys are ignored.
    pub fn apply_toml(&mut self, content: &str, origin: &str) -> Result<(), ConfigError> {
        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| ConfigError::ParseFailed {
                path: origin.to_string(),
                message: e.to_string(),
            })?;

        if let Some(v) = read_string(&doc, "remote")? {
            self.remote = v;
        }
        if let Some(v) = read_string(&doc, "base_branch")? {
            self.base_branch = v;
        }
        if let Some(v) = read_string(&doc, "strategy")? {
            self.strategy = v;
        }
        if let Some(v) = read_count(&doc, "target_count")? {
            self.target_count = v;
        }
        if let Some(v) = read_string(&doc, "branch_prefix")? {
            self.branch_prefix = v;
        }
        if let Some(v) = read_string(&doc, "title_prefix")? {
            self.title_prefix = v;
        }
        if let Some(v) = read_count(&doc, "module_depth")? {
            self.module_depth = v;
        }
        if let Some(v) = read_strings(&doc, "include")? {
            self.include = v;
        }
        if let Some(v) = read_strings(&doc, "exclude")? {
            self.exclude = v;
        }
        if let Some(v) = read_count(&doc, "bytes_per_line")? {
            self.bytes_per_line = Some(v as u64);
        }
        if let Some(v) = read_count(&doc, "max_parallel")? {
            self.max_parallel = v;
        }
        if let Some(v) = read_bool(&doc, "chain")? {
            self.chain = v;
        }
        if let Some(v) = read_bool(&doc, "draft")? {
            self.draft = v;
        }

        if let Some(table) = doc.get("categories").and_then(Item::as_table_like) {
            for (extension, item) in table.iter() {
                let key = format!("categories.{extension}");
                let name = item.as_str().ok_or_else(|| ConfigError::InvalidValue {
                    key: key.clone(),
                    message: "expected a string".to_string(),
                })?;
                let category = name
                    .parse::<FileCategory>()
                    .map_err(|message| ConfigError::InvalidValue { key, message })?;
                self.categories
                    .insert(extension.trim_start_matches('.').to_lowercase(), category);
            }
        }

        Ok(())
    }

    /// Overlay `SPLITPR_*` variables. Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_string(ENV_REMOTE) {
            self.remote = v;
        }
        if let Some(v) = env_string(ENV_BASE_BRANCH) {
            self.base_branch = v;
        }
        if let Some(v) = env_string(ENV_STRATEGY) {
            self.strategy = v;
        }
        if let Some(v) = env_string(ENV_BRANCH_PREFIX) {
            self.branch_prefix = v;
        }
        if let Some(v) = env_count(ENV_TARGET_COUNT, self.target_count) {
            self.target_count = v;
        }
        if let Some(v) = env_count(ENV_MAX_PARALLEL, self.max_parallel) {
            self.max_parallel = v;
        }
    }

    pub fn plan_config(&self) -> PlanConfig {
        let classifier = self
            .categories
            .iter()
            .fold(Classifier::default(), |classifier, (ext, category)| {
                classifier.with_extension(ext, *category)
            });

        PlanConfig {
            module_depth: self.module_depth.max(1),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            size_fallback: match self.bytes_per_line {
                Some(bytes_per_line) if bytes_per_line > 0 => SizeFallback::Bytes { bytes_per_line },
                _ => SizeFallback::Zero,
            },
            classifier,
        }
    }

    pub fn describe_options(&self) -> DescribeOptions {
        DescribeOptions {
            title_prefix: self.title_prefix.clone(),
            branch_prefix: self.branch_prefix.clone(),
            ..Default::default()
        }
    }
}

fn invalid(key: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected {expected}"),
    }
}

fn read_string(doc: &DocumentMut, key: &str) -> Result<Option<String>, ConfigError> {
    doc.get(key)
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid(key, "a string")))
        .transpose()
}

fn read_count(doc: &DocumentMut, key: &str) -> Result<Option<usize>, ConfigError> {
    doc.get(key)
        .map(|item| {
            item.as_integer()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| invalid(key, "a non-negative integer"))
        })
        .transpose()
}

fn read_bool(doc: &DocumentMut, key: &str) -> Result<Option<bool>, ConfigError> {
    doc.get(key)
        .map(|item| item.as_bool().ok_or_else(|| invalid(key, "true or false")))
        .transpose()
}

fn read_strings(doc: &DocumentMut, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(item) = doc.get(key) else {
        return Ok(None);
    };
    let array = item.as_array().ok_or_else(|| invalid(key, "an array of strings"))?;
    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(key, "an array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_count(name: &str, current: usize) -> Option<usize> {
    let raw = env_string(name)?;
    match raw.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Invalid {} value '{}', keeping {}", name, raw, current);
            None
        }
    }
}
