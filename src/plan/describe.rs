//! Human-facing titles, branch names and bodies for each group of a plan.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::assemble::{SplitGroup, SplitPlan};

/// Formatting knobs for [`describe_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeOptions {
    pub title_prefix: String,
    pub branch_prefix: String,
    /// Maximum number of files listed in a body before summarizing the rest.
    pub max_listed_files: usize,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            title_prefix: "Split PR".to_string(),
            branch_prefix: "split".to_string(),
            max_listed_files: 10,
        }
    }
}

/// Generated description of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub group_id: usize,
    /// 1-based position in merge order.
    pub position: usize,
    pub title: String,
    pub branch_name: String,
    pub body: String,
    pub file_count: usize,
    pub estimated_lines: u64,
}

/// A plan paired with descriptions for every group, in merge order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedPlan {
    pub plan: SplitPlan,
    pub descriptions: Vec<GroupDescription>,
}

impl DescribedPlan {
    pub fn description(&self, group_id: usize) -> Option<&GroupDescription> {
        self.descriptions.iter().find(|d| d.group_id == group_id)
    }

    pub fn branch_of(&self, group_id: usize) -> Option<&str> {
        self.description(group_id).map(|d| d.branch_name.as_str())
    }
}

/// Describe every group of a plan. Pure and deterministic.
pub fn describe_plan(plan: &SplitPlan, options: &DescribeOptions) -> DescribedPlan {
    let total = plan.merge_order.len();
    let prefix = slugify(&options.branch_prefix);
    let prefix = if prefix.is_empty() { "split".to_string() } else { prefix };

    let descriptions = plan
        .ordered_groups()
        .enumerate()
        .map(|(idx, group)| {
            let position = idx + 1;
            let title = format!("[{} {}/{}] {}", options.title_prefix, position, total, group.label);
            let slug = slugify(&group.label);
            let slug = if slug.is_empty() { "group".to_string() } else { slug };

            GroupDescription {
                group_id: group.id,
                position,
                title,
                branch_name: format!("{prefix}-{:02}-{slug}", group.id),
                body: render_body(plan, group, position, total, options),
                file_count: group.file_count(),
                estimated_lines: group.estimated_lines(),
            }
        })
        .collect();

    DescribedPlan {
        plan: plan.clone(),
        descriptions,
    }
}

/// Lowercase, git-ref-safe slug of at most 40 characters. `.` and `_` survive,
/// but never as a `..` run or a trailing `.lock`.
pub fn slugify(text: &str) -> String {
    let re = Regex::new(r"[^a-z0-9._]+").expect("Invalid regex");
    let dots = Regex::new(r"\.{2,}").expect("Invalid regex");
    let lowered = text.to_lowercase();
    let slug = re.replace_all(&lowered, "-");
    let slug = dots.replace_all(&slug, ".");
    let slug = slug.trim_matches(['-', '.']);
    let truncated: String = slug.chars().take(40).collect();
    let truncated = truncated.trim_end_matches(['-', '.']);
    match truncated.strip_suffix(".lock") {
        Some(stem) => format!("{stem}-lock"),
        None => truncated.to_string(),
    }
}

fn render_body(
    plan: &SplitPlan,
    group: &SplitGroup,
    position: usize,
    total: usize,
    options: &DescribeOptions,
) -> String {
    let mut body = String::new();

    body.push_str("## Summary\n\n");
    body.push_str(&format!(
        "Part {position} of {total} of a split into `{}` using the `{}` strategy.\n",
        plan.base_branch, plan.strategy
    ));
    body.push_str(&format!(
        "{}: {} file(s), ~{} lines changed.\n\n",
        group.label,
        group.file_count(),
        group.estimated_lines()
    ));

    body.push_str(&format!("### Files Changed ({} files)\n\n", group.file_count()));
    for file in group.files.iter().take(options.max_listed_files) {
        body.push_str(&format!("- `{}` ({})\n", file.path, file.change_kind));
    }
    if group.file_count() > options.max_listed_files {
        body.push_str(&format!(
            "- ... and {} more files\n",
            group.file_count() - options.max_listed_files
        ));
    }

    body.push_str("\n### Dependencies\n\n");
    if group.depends_on.is_empty() {
        body.push_str("None. This PR can be merged independently.\n");
    } else {
        let parts: Vec<String> = group
            .depends_on
            .iter()
            .filter_map(|id| plan.position_of(*id))
            .map(|pos| format!("{pos}/{total}"))
            .collect();
        body.push_str(&format!("Merge after part(s): {}\n", parts.join(", ")));
    }

    body.push_str("\n### Review Focus\n\n");
    body.push_str("- Code correctness and style\n");
    body.push_str("- Integration points with other parts of the split\n");

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanConfig, PlanRequest, generate_plan};
    use crate::inventory::FileInput;

    fn sample_plan() -> SplitPlan {
        let mut files: Vec<FileInput> = (0..12)
            .map(|i| FileInput::new(format!("api/handler_{i:02}.py"), 10))
            .collect();
        files.push(FileInput::new("db/models.py", 40));
        files.push(FileInput::new("db/schema.py", 40));

        let request = PlanRequest {
            files,
            target_count: 2,
            strategy: "by_module".to_string(),
            dependencies: Some(
                [(
                    "api/handler_00.py".to_string(),
                    ["db/models.py".to_string()].into(),
                )]
                .into(),
            ),
            base_branch: "main".to_string(),
        };
        generate_plan(&request, &PlanConfig::default()).unwrap()
    }

    #[test]
    fn test_titles_follow_merge_order() {
        let plan = sample_plan();
        let described = describe_plan(&plan, &DescribeOptions::default());

        assert_eq!(described.descriptions[0].title, "[Split PR 1/2] db module");
        assert_eq!(described.descriptions[1].title, "[Split PR 2/2] api module");
        assert_eq!(described.branch_of(1), Some("split-01-api-module"));
        assert_eq!(described.branch_of(2), Some("split-02-db-module"));
    }

    #[test]
    fn test_body_lists_files_and_dependencies() {
        let plan = sample_plan();
        let described = describe_plan(&plan, &DescribeOptions::default());
        let api = described.description(1).unwrap();

        assert!(api.body.contains("### Files Changed (12 files)"));
        assert!(api.body.contains("- `api/handler_00.py` (modified)"));
        assert!(api.body.contains("- ... and 2 more files"));
        assert!(api.body.contains("Merge after part(s): 1/2"));
        assert_eq!(api.estimated_lines, 120);

        let db = described.description(2).unwrap();
        assert!(db.body.contains("can be merged independently"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Source code (1/2)"), "source-code-1-2");
        assert_eq!(slugify("  !!!  "), "");
        assert_eq!(slugify(&"x".repeat(60)).len(), 40);
        assert_eq!(slugify("tools/gen/run.py"), "tools-gen-run.py");
        assert_eq!(slugify("a.rs"), "a.rs");
        assert_eq!(slugify("My_Module v2"), "my_module-v2");
    }

    #[test]
    fn test_slugify_keeps_refs_valid() {
        assert_eq!(slugify("a..b"), "a.b");
        assert_eq!(slugify(".hidden dir."), "hidden-dir");
        assert_eq!(slugify("Cargo.lock"), "cargo-lock");
    }

    #[test]
    fn test_describe_is_deterministic() {
        let plan = sample_plan();
        let options = DescribeOptions::default();
        assert_eq!(describe_plan(&plan, &options), describe_plan(&plan, &options));
    }
}
