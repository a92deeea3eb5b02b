use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CandidatePair, Field, Record};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Candidate-generation strategy. Both are pure functions of their inputs:
/// no randomness, so repeated invocation yields an identical set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingStrategy {
    /// Partition both sides by the normalized field value; emit the cross
    /// product within each partition present on both sides.
    ExactKey { field: Field },
    /// Sort the union of key values, then pair records whose key ranks in
    /// the merged order are within `window` of each other. `window = 0`
    /// degenerates to exact equality on the sort key.
    SortedNeighborhood { field: Field, window: usize },
}

impl BlockingStrategy {
    pub fn field(&self) -> Field {
        match self {
            Self::ExactKey { field } | Self::SortedNeighborhood { field, .. } => *field,
        }
    }
}

/// One comparison partition: the records a classifier may score against
/// each other. Anchored on side A's key; `b_ids` may be empty, which the
/// trained path reports as a degenerate block.
#[derive(Debug, Clone)]
pub struct Block {
    pub key: String,
    pub a_ids: Vec<u64>,
    pub b_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Candidate generation
// ---------------------------------------------------------------------------

/// Generate the candidate pair set for a strategy. Never fails: an empty
/// side simply yields an empty set.
pub fn block(
    records_a: &BTreeMap<u64, Record>,
    records_b: &BTreeMap<u64, Record>,
    strategy: &BlockingStrategy,
) -> BTreeSet<CandidatePair> {
    let mut pairs = BTreeSet::new();
    for blk in build_blocks(records_a, records_b, strategy) {
        for id_a in &blk.a_ids {
            for id_b in &blk.b_ids {
                pairs.insert(CandidatePair::new(*id_a, *id_b));
            }
        }
    }
    pairs
}

/// The partitions behind `block`, exposed so per-block classifier inference
/// runs over exactly the comparison space blocking admitted.
pub fn build_blocks(
    records_a: &BTreeMap<u64, Record>,
    records_b: &BTreeMap<u64, Record>,
    strategy: &BlockingStrategy,
) -> Vec<Block> {
    match strategy {
        BlockingStrategy::ExactKey { field } => {
            let parts_a = partitions(records_a, *field);
            let parts_b = partitions(records_b, *field);
            parts_a
                .into_iter()
                .map(|(key, a_ids)| {
                    let b_ids = parts_b.get(&key).cloned().unwrap_or_default();
                    Block { key, a_ids, b_ids }
                })
                .collect()
        }
        BlockingStrategy::SortedNeighborhood { field, window } => {
            let parts_a = partitions(records_a, *field);
            let parts_b = partitions(records_b, *field);

            // Dense ranks over the merged, sorted key order.
            let keys: Vec<&String> = {
                let mut set: BTreeSet<&String> = parts_a.keys().collect();
                set.extend(parts_b.keys());
                set.into_iter().collect()
            };

            let mut blocks = Vec::new();
            for (rank, key) in keys.iter().enumerate() {
                let Some(a_ids) = parts_a.get(*key) else {
                    continue;
                };
                let lo = rank.saturating_sub(*window);
                let hi = (rank + *window).min(keys.len().saturating_sub(1));
                let mut b_ids = Vec::new();
                for neighbor in &keys[lo..=hi] {
                    if let Some(ids) = parts_b.get(*neighbor) {
                        b_ids.extend(ids.iter().copied());
                    }
                }
                blocks.push(Block {
                    key: (*key).clone(),
                    a_ids: a_ids.clone(),
                    b_ids,
                });
            }
            blocks
        }
    }
}

/// Partition one side by the normalized blocking key. Records whose key is
/// missing (or normalizes to empty) are never emitted.
pub fn partitions(records: &BTreeMap<u64, Record>, field: Field) -> BTreeMap<String, Vec<u64>> {
    let mut parts: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for (id, record) in records {
        match record.field(field).as_str() {
            Some(key) if !key.is_empty() => {
                parts.entry(key.to_string()).or_default().push(*id);
            }
            _ => {}
        }
    }
    parts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
