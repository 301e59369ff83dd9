//! Module detection: grouping inventory paths into logical units by directory.

use std::collections::{BTreeMap, BTreeSet};

use crate::inventory::FileInventory;

use super::graph::DependencyRelation;

/// Name given to files that share no directory below the common root.
pub const ROOT_MODULE: &str = "root";

/// A logical unit of the codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub files: BTreeSet<String>,
    /// Other modules this one depends on, derived from the file relation.
    pub depends_on: BTreeSet<String>,
}

/// Every inventory path mapped to exactly one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMap {
    modules: BTreeMap<String, Module>,
    by_file: BTreeMap<String, String>,
}

impl ModuleMap {
    /// Modules in lexical order of name.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_of(&self, path: &str) -> Option<&str> {
        self.by_file.get(path).map(String::as_str)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.by_file
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Detect modules for an inventory.
///
/// The directory prefix shared by every path is stripped first. Remaining
/// paths are keyed by their first `depth` directory segments. A key shared by
/// several files is named after the longest directory prefix those files have
/// in common, or [`ROOT_MODULE`] when they sit directly under the stripped
/// root. A file alone under its key is a module by itself, named by its
/// relative path.
pub fn detect_modules(
    inventory: &FileInventory,
    depth: usize,
    relation: Option<&DependencyRelation>,
) -> ModuleMap {
    let by_file = infer_module_labels(inventory.paths(), depth);

    let mut modules: BTreeMap<String, Module> = BTreeMap::new();
    for (path, name) in &by_file {
        modules
            .entry(name.clone())
            .or_insert_with(|| Module {
                name: name.clone(),
                files: BTreeSet::new(),
                depends_on: BTreeSet::new(),
            })
            .files
            .insert(path.clone());
    }

    for (dependent, prerequisites) in relation.into_iter().flatten() {
        let Some(from) = by_file.get(dependent) else {
            continue;
        };
        for prerequisite in prerequisites {
            let Some(to) = by_file.get(prerequisite) else {
                continue;
            };
            if from == to {
                continue;
            }
            if let Some(module) = modules.get_mut(from) {
                module.depends_on.insert(to.clone());
            }
        }
    }

    ModuleMap { modules, by_file }
}

/// Map each path to its module name. Pure function of the path set and depth.
pub fn infer_module_labels<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    depth: usize,
) -> BTreeMap<String, String> {
    let paths: BTreeSet<&str> = paths.into_iter().collect();
    let split: Vec<(&str, Vec<&str>)> = paths
        .iter()
        .map(|p| (*p, p.split('/').collect::<Vec<_>>()))
        .collect();

    let root_len = shared_dir_prefix(split.iter().map(|(_, segs)| dirs_of(segs)));

    // key -> [(path, relative segments)]
    let mut keyed: BTreeMap<String, Vec<(&str, &[&str])>> = BTreeMap::new();
    for (path, segments) in &split {
        let relative = &segments[root_len..];
        let dirs = dirs_of(relative);
        let key = dirs[..depth.min(dirs.len())].join("/");
        keyed.entry(key).or_default().push((*path, relative));
    }

    let mut labels = BTreeMap::new();
    for members in keyed.values() {
        if let [(path, relative)] = members.as_slice() {
            labels.insert(path.to_string(), relative.join("/"));
            continue;
        }

        let common = shared_dir_prefix(members.iter().map(|(_, rel)| dirs_of(rel)));
        let name = if common == 0 {
            ROOT_MODULE.to_string()
        } else {
            dirs_of(members[0].1)[..common].join("/")
        };
        for (path, _) in members {
            labels.insert(path.to_string(), name.clone());
        }
    }

    labels
}

fn dirs_of<'s>(segments: &'s [&'s str]) -> &'s [&'s str] {
    &segments[..segments.len().saturating_sub(1)]
}

/// Number of leading directory segments every entry has in common.
fn shared_dir_prefix<'s>(mut dirs: impl Iterator<Item = &'s [&'s str]>) -> usize {
    let Some(first) = dirs.next() else {
        return 0;
    };
    dirs.fold(first.len(), |len, other| {
        first[..len]
            .iter()
            .zip(other)
            .take_while(|(a, b)| a == b)
            .count()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{FileInput, PathFilter};

    fn labels(paths: &[&str], depth: usize) -> BTreeMap<String, String> {
        infer_module_labels(paths.iter().copied(), depth)
    }

    #[test]
    fn test_top_level_directories() {
        let result = labels(&["api/a.py", "api/b.py", "db/c.py", "db/d.py"], 1);
        assert_eq!(result["api/a.py"], "api");
        assert_eq!(result["db/d.py"], "db");
    }

    #[test]
    fn test_shared_root_is_stripped() {
        let result = labels(
            &["src/app/api/a.py", "src/app/api/b.py", "src/app/db/c.py", "src/app/db/d.py"],
            1,
        );
        assert_eq!(result["src/app/api/a.py"], "api");
        assert_eq!(result["src/app/db/c.py"], "db");
    }

    #[test]
    fn test_root_level_files_share_root_module() {
        let result = labels(&["Cargo.toml", "README.md", "src/lib.rs", "src/main.rs"], 1);
        assert_eq!(result["Cargo.toml"], ROOT_MODULE);
        assert_eq!(result["README.md"], ROOT_MODULE);
        assert_eq!(result["src/lib.rs"], "src");
    }

    #[test]
    fn test_singleton_named_by_relative_path() {
        let result = labels(&["api/a.py", "api/b.py", "tools/gen/run.py"], 1);
        assert_eq!(result["tools/gen/run.py"], "tools/gen/run.py");
    }

    #[test]
    fn test_group_named_by_longest_common_prefix() {
        let result = labels(&["lib/core/x/a.rs", "lib/core/x/b.rs", "web/index.ts"], 1);
        assert_eq!(result["lib/core/x/a.rs"], "lib/core/x");
    }

    #[test]
    fn test_depth_two() {
        let result = labels(
            &["src/a/one.rs", "src/a/two.rs", "src/b/three.rs", "src/b/four.rs", "docs/x.md", "docs/y.md"],
            2,
        );
        assert_eq!(result["src/a/one.rs"], "src/a");
        assert_eq!(result["src/b/four.rs"], "src/b");
        assert_eq!(result["docs/x.md"], "docs");
    }

    #[test]
    fn test_single_file() {
        let result = labels(&["deep/nested/only.rs"], 1);
        assert_eq!(result["deep/nested/only.rs"], "only.rs");
    }

    #[test]
    fn test_detect_modules_dependencies() {
        let inputs: Vec<FileInput> = ["api/a.py", "api/b.py", "db/c.py", "db/d.py"]
            .iter()
            .map(|p| FileInput::new(*p, 5))
            .collect();
        let inventory = FileInventory::from_inputs(&inputs, &PathFilter::default()).unwrap();
        let relation: DependencyRelation = [
            ("api/a.py".to_string(), BTreeSet::from(["db/c.py".to_string()])),
            ("api/b.py".to_string(), BTreeSet::from(["api/a.py".to_string()])),
        ]
        .into();

        let map = detect_modules(&inventory, 1, Some(&relation));

        assert_eq!(map.len(), 2);
        assert_eq!(map.module_of("db/c.py"), Some("db"));
        let api = map.get("api").unwrap();
        assert_eq!(api.depends_on, BTreeSet::from(["db".to_string()]));
        assert!(map.get("db").unwrap().depends_on.is_empty());
    }
}
