use super::{Bucket, Candidate, Partition, PartitionInput, merge_to_target};
use crate::plan::modules::ROOT_MODULE;

/// One group per module, merging the smallest modules when there are too many.
pub struct ByModule;

impl Partition for ByModule {
    fn partition(&self, input: &PartitionInput<'_>, target: usize) -> Vec<Bucket> {
        let candidates: Vec<Candidate<String>> = input
            .modules
            .modules()
            .enumerate()
            .map(|(rank, module)| Candidate {
                rank,
                members: vec![module.name.clone()],
                files: module.files.iter().cloned().collect(),
                weight: module
                    .files
                    .iter()
                    .filter_map(|path| input.inventory.get(path))
                    .map(|record| input.weight(record))
                    .fold(0, u64::saturating_add),
            })
            .collect();

        merge_to_target(candidates, target)
            .into_iter()
            .map(|candidate| Bucket {
                label: module_label(candidate.members),
                files: candidate.files,
            })
            .collect()
    }
}

fn module_label(mut names: Vec<String>) -> String {
    names.sort();
    match names.as_slice() {
        [name] if name == ROOT_MODULE => "Root files".to_string(),
        [name] => format!("{name} module"),
        [first, second] => format!("{first} and {second} modules"),
        [first, rest @ ..] => format!("{first} and {} other modules", rest.len()),
        [] => "Empty".to_string(),
    }
}
