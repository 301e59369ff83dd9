use std::collections::BTreeMap;

use crate::inventory::FileCategory;

use super::{Bucket, Candidate, Partition, PartitionInput, balance, merge_to_target};

/// Groups by file category, in the fixed order config, source, tests, docs, other.
///
/// With fewer categories than the target, spare groups go to whichever
/// category carries the most weight per group so far, and each category is
/// then balanced across its share.
pub struct ByType;

impl Partition for ByType {
    fn partition(&self, input: &PartitionInput<'_>, target: usize) -> Vec<Bucket> {
        let mut by_category: BTreeMap<FileCategory, Vec<(String, u64)>> = BTreeMap::new();
        for record in input.inventory.records() {
            by_category
                .entry(input.classifier.classify(&record.path))
                .or_default()
                .push((record.path.clone(), input.weight(record)));
        }
        let categories: Vec<(FileCategory, Vec<(String, u64)>)> = by_category.into_iter().collect();

        if categories.len() >= target {
            return merge_categories(categories, target);
        }

        let slots = allocate_slots(&categories, target);
        let mut buckets = Vec::new();
        for ((category, files), slot_count) in categories.into_iter().zip(slots) {
            let parts = balance(files, slot_count);
            let total = parts.len();
            for (idx, files) in parts.into_iter().enumerate() {
                let label = if total == 1 {
                    category.title().to_string()
                } else {
                    format!("{} ({}/{})", category.title(), idx + 1, total)
                };
                buckets.push(Bucket { label, files });
            }
        }
        buckets
    }
}

fn merge_categories(categories: Vec<(FileCategory, Vec<(String, u64)>)>, target: usize) -> Vec<Bucket> {
    let candidates: Vec<Candidate<FileCategory>> = categories
        .into_iter()
        .enumerate()
        .map(|(rank, (category, files))| Candidate {
            rank,
            members: vec![category],
            weight: files.iter().fold(0, |acc: u64, (_, w)| acc.saturating_add(*w)),
            files: files.into_iter().map(|(path, _)| path).collect(),
        })
        .collect();

    merge_to_target(candidates, target)
        .into_iter()
        .map(|mut candidate| {
            candidate.members.sort();
            let titles: Vec<&str> = candidate.members.iter().map(|c| c.title()).collect();
            Bucket {
                label: titles.join(" and "),
                files: candidate.files,
            }
        })
        .collect()
}

/// One slot per category, then each spare slot to the category with the
/// highest weight per slot (file count per slot breaks ties, then order).
/// A category never gets more slots than it has files.
fn allocate_slots(categories: &[(FileCategory, Vec<(String, u64)>)], target: usize) -> Vec<usize> {
    let weights: Vec<u128> = categories
        .iter()
        .map(|(_, files)| files.iter().map(|(_, w)| u128::from(*w)).sum())
        .collect();
    let counts: Vec<usize> = categories.iter().map(|(_, files)| files.len()).collect();
    let mut slots = vec![1usize; categories.len()];

    for _ in categories.len()..target {
        let mut best: Option<usize> = None;
        for i in 0..categories.len() {
            if slots[i] >= counts[i] {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    // Compare weight_i / slots_i against weight_b / slots_b without division.
                    let lhs = weights[i] * slots[b] as u128;
                    let rhs = weights[b] * slots[i] as u128;
                    lhs > rhs
                        || (lhs == rhs
                            && counts[i] as u128 * slots[b] as u128
                                > counts[b] as u128 * slots[i] as u128)
                }
            };
            if better {
                best = Some(i);
            }
        }
        match best {
            Some(i) => slots[i] += 1,
            None => break,
        }
    }

    slots
}
