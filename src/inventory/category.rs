//! File categories used by the by-type strategy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::{file_extension, file_name};

/// Category of a file. Declaration order is the order categories are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Config,
    Source,
    Test,
    Documentation,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 5] = [
        FileCategory::Config,
        FileCategory::Source,
        FileCategory::Test,
        FileCategory::Documentation,
        FileCategory::Other,
    ];

    /// Human-readable name used in group labels.
    pub fn title(self) -> &'static str {
        match self {
            FileCategory::Config => "Configuration",
            FileCategory::Source => "Source code",
            FileCategory::Test => "Tests",
            FileCategory::Documentation => "Documentation",
            FileCategory::Other => "Other files",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileCategory::Config => "config",
            FileCategory::Source => "source",
            FileCategory::Test => "test",
            FileCategory::Documentation => "documentation",
            FileCategory::Other => "other",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "config" | "configuration" => Ok(FileCategory::Config),
            "source" | "code" | "src" => Ok(FileCategory::Source),
            "test" | "tests" => Ok(FileCategory::Test),
            "documentation" | "docs" | "doc" => Ok(FileCategory::Documentation),
            "other" => Ok(FileCategory::Other),
            other => Err(format!(
                "unknown category '{other}' (expected config, source, test, documentation, other)"
            )),
        }
    }
}

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "mjs", "cjs", "java", "kt", "scala", "cs", "go", "rs", "c",
    "h", "cc", "cpp", "hpp", "rb", "php", "swift", "m", "sh", "bash", "sql", "vue", "svelte",
    "css", "scss", "html",
];

const CONFIG_EXTENSIONS: &[&str] = &[
    "yaml", "yml", "json", "toml", "ini", "cfg", "conf", "xml", "properties", "env", "lock",
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt", "adoc"];

const CONFIG_FILE_NAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
    ".dockerignore",
];

const DOC_FILE_PREFIXES: &[&str] = &["readme", "license", "changelog", "contributing"];

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];

/// Assigns a [`FileCategory`] to paths.
///
/// Overrides are consulted first: exact paths, then extensions. After that a
/// file is a test if it lives in a test directory or its name says so, and
/// otherwise its extension decides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    path_overrides: BTreeMap<String, FileCategory>,
    extension_overrides: BTreeMap<String, FileCategory>,
}

impl Classifier {
    pub fn with_extension(mut self, extension: &str, category: FileCategory) -> Self {
        let extension = extension.trim_start_matches('.').to_lowercase();
        self.extension_overrides.insert(extension, category);
        self
    }

    pub fn with_path(mut self, path: &str, category: FileCategory) -> Self {
        self.path_overrides.insert(path.to_string(), category);
        self
    }

    pub fn classify(&self, path: &str) -> FileCategory {
        if let Some(category) = self.path_overrides.get(path) {
            return *category;
        }

        let extension = file_extension(path);
        if let Some(category) = self.extension_overrides.get(&extension) {
            return *category;
        }

        if is_test_path(path) {
            return FileCategory::Test;
        }

        let name = file_name(path).to_lowercase();
        if CONFIG_FILE_NAMES.contains(&name.as_str()) || name.starts_with(".env") {
            return FileCategory::Config;
        }
        if DOC_FILE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return FileCategory::Documentation;
        }

        let extension = extension.as_str();
        if SOURCE_EXTENSIONS.contains(&extension) {
            FileCategory::Source
        } else if CONFIG_EXTENSIONS.contains(&extension) {
            FileCategory::Config
        } else if DOC_EXTENSIONS.contains(&extension) {
            FileCategory::Documentation
        } else {
            FileCategory::Other
        }
    }
}

fn is_test_path(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    let name = segments.pop().unwrap_or_default().to_lowercase();

    if segments
        .iter()
        .any(|dir| TEST_DIRS.contains(&dir.to_lowercase().as_str()))
    {
        return true;
    }

    let stem = name.split('.').next().unwrap_or_default();
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || name.contains(".test.")
        || name.contains(".spec.")
}
