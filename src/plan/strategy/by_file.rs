use super::{Bucket, Partition, PartitionInput};

/// Contiguous runs of path-sorted files, sized as evenly as possible.
pub struct ByFile;

impl Partition for ByFile {
    fn partition(&self, input: &PartitionInput<'_>, target: usize) -> Vec<Bucket> {
        let paths: Vec<String> = input.inventory.paths().map(str::to_string).collect();
        if paths.is_empty() {
            return Vec::new();
        }

        let groups = target.clamp(1, paths.len());
        let base = paths.len() / groups;
        let extra = paths.len() % groups;

        let mut buckets = Vec::with_capacity(groups);
        let mut remaining = paths.into_iter();
        for idx in 0..groups {
            let size = base + usize::from(idx < extra);
            let files: Vec<String> = remaining.by_ref().take(size).collect();
            let label = match files.as_slice() {
                [only] => only.clone(),
                _ => format!("Files part {}", idx + 1),
            };
            buckets.push(Bucket { label, files });
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Classifier, FileInput, FileInventory, PathFilter, SizeFallback};
    use crate::plan::modules::detect_modules;

    fn run(paths: &[&str], target: usize) -> Vec<Bucket> {
        let inputs: Vec<FileInput> = paths.iter().map(|p| FileInput::new(*p, 1)).collect();
        let inventory = FileInventory::from_inputs(&inputs, &PathFilter::default()).unwrap();
        let modules = detect_modules(&inventory, 1, None);
        let classifier = Classifier::default();
        let input = PartitionInput {
            inventory: &inventory,
            modules: &modules,
            classifier: &classifier,
            size_fallback: SizeFallback::Zero,
        };
        ByFile.partition(&input, target)
    }

    #[test]
    fn test_one_file_per_group_when_under_target() {
        let buckets = run(&["c.rs", "a.rs", "b.rs"], 5);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].files, vec!["a.rs"]);
        assert_eq!(buckets[0].label, "a.rs");
    }

    #[test]
    fn test_chunks_front_loaded() {
        let buckets = run(&["a", "b", "c", "d", "e", "f", "g"], 3);
        let sizes: Vec<usize> = buckets.iter().map(|b| b.files.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(buckets[0].files, vec!["a", "b", "c"]);
        assert_eq!(buckets[2].files, vec!["f", "g"]);
        assert_eq!(buckets[1].label, "Files part 2");
    }
}
