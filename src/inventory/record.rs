//! File records and inventory normalization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

use super::filter::PathFilter;

/// How a file changed relative to the base branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[serde(alias = "add")]
    Added,
    #[default]
    #[serde(alias = "edit", alias = "modify")]
    Modified,
    #[serde(alias = "delete")]
    Deleted,
    #[serde(alias = "rename")]
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// Raw file record as supplied by a caller (a PR listing, a git diff, a JSON file).
///
/// `lines` wins over `additions + deletions` when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    #[serde(alias = "filePath")]
    pub path: String,
    #[serde(default, alias = "lineCount", alias = "line_count")]
    pub lines: Option<u64>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default, alias = "changeType", alias = "change_type", alias = "changeKind")]
    pub change_kind: ChangeKind,
    #[serde(default, alias = "oldPath")]
    pub old_path: Option<String>,
    #[serde(default, alias = "size", alias = "sizeBytes")]
    pub size_bytes: Option<u64>,
}

impl FileInput {
    /// Shorthand used by callers that only know a path and a line count.
    pub fn new(path: impl Into<String>, lines: u64) -> Self {
        Self {
            path: path.into(),
            lines: Some(lines),
            ..Default::default()
        }
    }

    fn line_count(&self) -> u64 {
        self.lines
            .unwrap_or(self.additions.saturating_add(self.deletions))
    }
}

/// Weight used for files whose line count is zero (binary files, empty files).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeFallback {
    /// Zero-line files weigh nothing.
    #[default]
    Zero,
    /// Derive a weight from the byte size: one line per `bytes_per_line` bytes, rounded up.
    Bytes { bytes_per_line: u64 },
}

/// A normalized file in the inventory. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(default)]
    pub line_count: u64,
    #[serde(default)]
    pub change_kind: ChangeKind,
    #[serde(default)]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl FileRecord {
    /// Balancing weight of this file under the given fallback.
    pub fn weight(&self, fallback: SizeFallback) -> u64 {
        if self.line_count > 0 {
            return self.line_count;
        }
        match (fallback, self.size_bytes) {
            (SizeFallback::Bytes { bytes_per_line }, Some(bytes)) if bytes_per_line > 0 => {
                bytes.div_ceil(bytes_per_line)
            }
            _ => 0,
        }
    }

    /// Extension without the leading dot, lowercased. Empty for files without one.
    pub fn extension(&self) -> String {
        file_extension(&self.path)
    }
}

/// Sum of line counts or weights, clamped at `u64::MAX`.
pub(crate) fn saturating_total(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn file_extension(path: &str) -> String {
    let name = file_name(path);
    name.rfind('.')
        .map(|idx| name[idx + 1..].to_lowercase())
        .unwrap_or_default()
}

/// Normalize a path to forward slashes with no leading `./` or `/` and no empty segments.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical, path-sorted list of unique file records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInventory {
    records: Vec<FileRecord>,
}

impl FileInventory {
    /// Normalize raw inputs, apply the filter, and collapse duplicate paths.
    ///
    /// When a path appears more than once, the last record for it wins.
    pub fn from_inputs(inputs: &[FileInput], filter: &PathFilter) -> Result<Self, PlanError> {
        let mut by_path: BTreeMap<String, FileRecord> = BTreeMap::new();

        for input in inputs {
            let path = normalize_path(&input.path);
            if path.is_empty() || !filter.allows(&path) {
                continue;
            }

            let record = FileRecord {
                path: path.clone(),
                line_count: input.line_count(),
                change_kind: input.change_kind,
                module: String::new(),
                old_path: input.old_path.as_deref().map(normalize_path),
                size_bytes: input.size_bytes,
            };
            by_path.insert(path, record);
        }

        if by_path.is_empty() {
            return Err(PlanError::EmptyInventory);
        }

        Ok(Self {
            records: by_path.into_values().collect(),
        })
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records
            .binary_search_by(|r| r.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn total_lines(&self) -> u64 {
        saturating_total(self.records.iter().map(|r| r.line_count))
    }

    /// New inventory with module labels filled in. Paths without a label keep an empty module.
    pub fn with_modules(&self, labels: &BTreeMap<String, String>) -> Self {
        let records = self
            .records
            .iter()
            .map(|r| FileRecord {
                module: labels.get(&r.path).cloned().unwrap_or_default(),
                ..r.clone()
            })
            .collect();
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./src/main.rs"), "src/main.rs");
        assert_eq!(normalize_path("src\\lib\\mod.rs"), "src/lib/mod.rs");
        assert_eq!(normalize_path("/abs//path/./file.py"), "abs/path/file.py");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_line_count_prefers_explicit_lines() {
        let input = FileInput {
            path: "a.rs".into(),
            lines: Some(7),
            additions: 100,
            deletions: 50,
            ..Default::default()
        };
        assert_eq!(input.line_count(), 7);

        let input = FileInput {
            path: "a.rs".into(),
            additions: 10,
            deletions: 5,
            ..Default::default()
        };
        assert_eq!(input.line_count(), 15);
    }

    #[test]
    fn test_inventory_sorted_and_deduplicated() {
        let inputs = vec![
            FileInput::new("b.rs", 1),
            FileInput::new("./a.rs", 2),
            FileInput::new("b.rs", 9),
        ];
        let inventory = FileInventory::from_inputs(&inputs, &PathFilter::default()).unwrap();

        let paths: Vec<&str> = inventory.paths().collect();
        assert_eq!(paths, vec!["a.rs", "b.rs"]);
        assert_eq!(inventory.get("b.rs").unwrap().line_count, 9);
        assert_eq!(inventory.total_lines(), 11);
    }

    #[test]
    fn test_inventory_empty_after_filter() {
        let inputs = vec![FileInput::new("docs/readme.md", 3)];
        let filter = PathFilter::new(&["*.rs".to_string()], &[]).unwrap();
        let result = FileInventory::from_inputs(&inputs, &filter);
        assert_eq!(result, Err(PlanError::EmptyInventory));
    }

    #[test]
    fn test_weight_fallback() {
        let record = FileRecord {
            path: "logo.png".into(),
            line_count: 0,
            change_kind: ChangeKind::Added,
            module: String::new(),
            old_path: None,
            size_bytes: Some(4001),
        };
        assert_eq!(record.weight(SizeFallback::Zero), 0);
        assert_eq!(record.weight(SizeFallback::Bytes { bytes_per_line: 40 }), 101);
        assert_eq!(record.weight(SizeFallback::Bytes { bytes_per_line: 0 }), 0);
    }

    #[test]
    fn test_change_kind_aliases() {
        let input: FileInput =
            serde_json::from_str(r#"{"filePath": "x.py", "changeType": "add", "additions": 4}"#)
                .unwrap();
        assert_eq!(input.change_kind, ChangeKind::Added);
        assert_eq!(input.line_count(), 4);

        let input: FileInput = serde_json::from_str(r#"{"path": "y.py"}"#).unwrap();
        assert_eq!(input.change_kind, ChangeKind::Modified);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("src/Main.RS"), "rs");
        assert_eq!(file_extension(".env"), "env");
        assert_eq!(file_extension("Makefile"), "");
        assert_eq!(file_extension("a/b.tar.gz"), "gz");
    }
}
