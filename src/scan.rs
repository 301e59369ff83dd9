//! Inventory of the existing files under a folder, for splitting code that
//! does not come from a diff.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::inventory::{ChangeKind, FileInput, PathFilter, normalize_path};

/// Directories never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "__pycache__",
    "node_modules",
    "venv",
    ".venv",
    ".pytest_cache",
    ".mypy_cache",
    ".idea",
    ".vscode",
    "target",
];

/// Files skipped wherever they appear.
pub const IGNORED_FILES: &[&str] = &["*.pyc", "*.pyo", ".DS_Store"];

/// Walk `root` and return one added [`FileInput`] per file, path-sorted.
///
/// Line counts come from the file contents. Files containing a NUL byte are
/// treated as binary and get zero lines, so only the byte-size fallback can
/// weigh them. Unreadable entries are skipped with a warning.
pub fn scan_folder(root: &Path) -> Result<Vec<FileInput>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.display().to_string()));
    }

    let ignored_files = PathFilter::new(&[], &patterns(IGNORED_FILES)).map_err(ScanError::Pattern)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = normalize_path(&relative.to_string_lossy());
        if path.is_empty() || !ignored_files.allows(&path) {
            continue;
        }

        files.push(read_file(entry.path(), path));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Scanned {} files under {}", files.len(), root.display());

    if files.is_empty() {
        return Err(ScanError::NoFiles(root.display().to_string()));
    }
    Ok(files)
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && IGNORED_DIRS.iter().any(|name| entry.file_name() == *name)
}

fn read_file(full_path: &Path, path: String) -> FileInput {
    let (lines, size) = match fs::read(full_path) {
        Ok(bytes) => (count_lines(&bytes), bytes.len() as u64),
        Err(e) => {
            warn!("Failed to read {}: {}", full_path.display(), e);
            (0, 0)
        }
    };

    FileInput {
        path,
        lines: Some(lines),
        additions: lines,
        change_kind: ChangeKind::Added,
        size_bytes: Some(size),
        ..Default::default()
    }
}

fn count_lines(bytes: &[u8]) -> u64 {
    if bytes.contains(&0) {
        return 0;
    }
    String::from_utf8_lossy(bytes).lines().count() as u64
}

fn patterns(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
