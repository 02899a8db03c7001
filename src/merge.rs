//! Collapses same-gene qualifying records that describe the same residue-level
//! change into a single logical mutation.

use std::collections::HashMap;

use crate::accumulator::PendingMutation;
use crate::annotation::MutationType;

/// One merge group, represented by its first-encountered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedMutation {
    pub discovery: u64,
    pub gene: String,
    pub mutation_type: MutationType,
    pub mutation: String,
    pub sample_count: u64,
    /// Number of records folded into this group.
    pub members: usize,
}

impl MergedMutation {
    fn from_pending(pending: PendingMutation) -> Self {
        let mutation_type = pending.record.mutation_type();
        Self {
            discovery: pending.discovery,
            gene: pending.record.gene,
            mutation_type,
            mutation: pending.record.mutation,
            sample_count: pending.record.sample_count,
            members: 1,
        }
    }
}

/// Grouping key: the descriptor without its final character, so `p.C49H` and
/// `p.C49R` share the key `p.C49`.
pub fn merge_key(descriptor: &str) -> &str {
    match descriptor.char_indices().next_back() {
        Some((idx, _)) => &descriptor[..idx],
        None => descriptor,
    }
}

/// Merges one gene's pending records. Groups come out in the order their first
/// member was encountered.
pub fn merge_gene(pending: Vec<PendingMutation>) -> Vec<MergedMutation> {
    // Assign every record to a group before consuming any of them.
    let mut groups_by_key: HashMap<&str, usize> = HashMap::new();
    let assignment: Vec<usize> = pending
        .iter()
        .map(|p| {
            let next = groups_by_key.len();
            *groups_by_key
                .entry(merge_key(&p.record.mutation))
                .or_insert(next)
        })
        .collect();
    let group_count = groups_by_key.len();
    drop(groups_by_key);

    // Group ids were handed out in encounter order, so a record opening a new
    // group always carries the next unused id.
    let mut groups: Vec<MergedMutation> = Vec::with_capacity(group_count);
    for (p, group) in pending.into_iter().zip(assignment) {
        if group == groups.len() {
            groups.push(MergedMutation::from_pending(p));
        } else {
            let merged = &mut groups[group];
            merged.sample_count = merged.sample_count.saturating_add(p.record.sample_count);
            merged.members += 1;
        }
    }

    groups
}

/// Promotes every pending record to its own group, as the unmerged
/// frequency-only report expects.
pub fn without_merging(pending: Vec<PendingMutation>) -> Vec<MergedMutation> {
    pending.into_iter().map(MergedMutation::from_pending).collect()
}
