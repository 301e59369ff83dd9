//! Integration tests for planning the existing files of a folder.

use std::fs;
use std::path::Path;

use splitpr::ChangeKind;
use splitpr::plan::{PlanConfig, PlanRequest, generate_plan};
use splitpr::scan::scan_folder;

fn write(root: &Path, path: &str, contents: &[u8]) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).expect("Failed to create directories");
    }
    fs::write(full, contents).expect("Failed to write file");
}

fn sample_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let root = dir.path();
    write(root, "src/app/main.py", b"import util\n\nprint(util.run())\n");
    write(root, "src/app/util.py", b"def run():\n    return 1\n");
    write(root, "docs/guide.md", b"# Guide\n");
    write(root, "assets/logo.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
    write(root, "node_modules/lib/index.js", b"module.exports = 1;\n");
    write(root, "src/app/__pycache__/main.cpython-312.pyc", b"\0\0");
    write(root, ".git/HEAD", b"ref: refs/heads/main\n");
    write(root, "stale.pyc", b"\0");
    write(root, "docs/.DS_Store", b"\0");
    dir
}

#[test]
fn test_scan_skips_ignored_directories_and_files() {
    let dir = sample_folder();

    let files = scan_folder(dir.path()).unwrap();

    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["assets/logo.png", "docs/guide.md", "src/app/main.py", "src/app/util.py"]
    );
    let lines: Vec<Option<u64>> = files.iter().map(|f| f.lines).collect();
    assert_eq!(lines, vec![Some(0), Some(1), Some(3), Some(2)]);
    assert!(files.iter().all(|f| f.change_kind == ChangeKind::Added));
    assert_eq!(files[0].size_bytes, Some(16));
}

#[test]
fn test_scanned_folder_feeds_plan_generation() {
    let dir = sample_folder();
    let request = PlanRequest {
        files: scan_folder(dir.path()).unwrap(),
        target_count: 5,
        strategy: "by_module".to_string(),
        dependencies: None,
        base_branch: "main".to_string(),
    };

    let plan = generate_plan(&request, &PlanConfig::default()).unwrap();

    assert_eq!(plan.groups.len(), 3);
    assert_eq!(plan.summary().total_files, 4);
    assert_eq!(plan.summary().total_lines, 6);
}
