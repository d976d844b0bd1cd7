//! Chunk planning (C4)
//!
//! Partitions a resolved change list into bounded contiguous chunks,
//! preserving submission order. Resolution has already rejected
//! use-before-definition, so ordering constraints (creations before
//! references, concepts before visuals, visuals before connections) hold by
//! construction; the planner still shifts a boundary earlier if a change
//! would land in the same chunk as a tempId it references that is only
//! defined later in that chunk.

use std::collections::HashSet;
use std::ops::Range;

use indexmap::IndexMap;
use serde::Serialize;

use crate::bom::Change;

/// One planned chunk: a contiguous index range of the change list
pub type ChunkRange = Range<usize>;

/// Partition `changes` into chunks of at most `chunk_size`
pub fn plan_chunks(changes: &[Change], chunk_size: usize) -> Vec<ChunkRange> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < changes.len() {
        let hard_end = (start + chunk_size).min(changes.len());
        let mut end = hard_end;

        // Defensive boundary shift: no change may precede, within its own
        // chunk, the definition of a tempId it references.
        let mut defined: HashSet<&str> = HashSet::new();
        for (offset, change) in changes[start..hard_end].iter().enumerate() {
            let index = start + offset;
            let references = referenced_symbols(change);
            let later_defined = references.iter().any(|r| {
                !defined.contains(r.as_str())
                    && changes[index + 1..hard_end]
                        .iter()
                        .any(|later| later.declared_temp_id() == Some(r.as_str()))
            });
            if later_defined && index > start {
                end = index;
                break;
            }
            if let Some(temp_id) = change.declared_temp_id() {
                defined.insert(temp_id);
            }
        }

        chunks.push(start..end);
        start = end;
    }
    chunks
}

fn referenced_symbols(change: &Change) -> Vec<String> {
    let mut clone = change.clone();
    clone
        .reference_fields()
        .into_iter()
        .map(|(_, field)| field.clone())
        .collect()
}

/// Dry-run report returned by /model/plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub change_count: usize,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub by_op: IndexMap<String, usize>,
    pub temp_ids: Vec<String>,
    pub violations: Vec<crate::validate::Violation>,
}

impl PlanReport {
    pub fn new(
        changes: &[Change],
        chunks: &[ChunkRange],
        chunk_size: usize,
        violations: Vec<crate::validate::Violation>,
    ) -> Self {
        let mut by_op: IndexMap<String, usize> = IndexMap::new();
        for change in changes {
            *by_op.entry(change.op_name().to_string()).or_default() += 1;
        }
        Self {
            change_count: changes.len(),
            chunk_count: chunks.len(),
            chunk_size,
            by_op,
            temp_ids: changes
                .iter()
                .filter_map(|c| c.declared_temp_id().map(str::to_string))
                .collect(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, temp: &str) -> Change {
        serde_json::from_value(serde_json::json!({
            "op": "createElement", "type": "business-actor", "name": name, "tempId": temp
        }))
        .unwrap()
    }

    #[test]
    fn partition_preserves_order_and_size() {
        let changes: Vec<Change> = (0..7).map(|i| create(&format!("e{i}"), &format!("t{i}"))).collect();
        let chunks = plan_chunks(&changes, 3);
        assert_eq!(chunks, vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn single_chunk_when_size_covers_batch() {
        let changes: Vec<Change> = (0..40).map(|i| create(&format!("e{i}"), &format!("t{i}"))).collect();
        let chunks = plan_chunks(&changes, 50);
        assert_eq!(chunks, vec![0..40]);
    }

    #[test]
    fn plan_report_counts_ops() {
        let changes = vec![create("a", "t1"), create("b", "t2")];
        let chunks = plan_chunks(&changes, 1);
        let report = PlanReport::new(&changes, &chunks, 1, Vec::new());
        assert_eq!(report.by_op["createElement"], 2);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.temp_ids, vec!["t1", "t2"]);
    }
}
