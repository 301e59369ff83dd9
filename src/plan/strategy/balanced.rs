use super::{Bucket, Partition, PartitionInput};

/// Greedy longest-processing-time balancing of line weight.
pub struct Balanced;

impl Partition for Balanced {
    fn partition(&self, input: &PartitionInput<'_>, target: usize) -> Vec<Bucket> {
        let items = input.weighted_paths(input.inventory.records());
        let bins = balance(items, target);

        let total = bins.len();
        bins.into_iter()
            .enumerate()
            .map(|(idx, files)| Bucket {
                label: if total == 1 {
                    "All changes".to_string()
                } else {
                    format!("Balanced batch {}", idx + 1)
                },
                files,
            })
            .collect()
    }
}

/// Distribute weighted paths into at most `bins` non-empty bins.
///
/// Items are placed heaviest first (path order among equals) into the bin
/// with the smallest total, lowest index among equals. Member
/// lists come back path-sorted.
pub(crate) fn balance(mut items: Vec<(String, u64)>, bins: usize) -> Vec<Vec<String>> {
    if items.is_empty() {
        return Vec::new();
    }
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let bins = bins.clamp(1, items.len());
    let mut totals = vec![0u64; bins];
    let mut members: Vec<Vec<String>> = vec![Vec::new(); bins];

    for (path, weight) in items {
        let target = (0..bins)
            .min_by_key(|&i| (totals[i], i))
            .unwrap_or(0);
        totals[target] = totals[target].saturating_add(weight);
        members[target].push(path);
    }

    for bin in &mut members {
        bin.sort();
    }
    members.retain(|bin| !bin.is_empty());
    members
}
