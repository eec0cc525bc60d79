use crate::types::{EntityWrite, WriteBatch, WriteOp};

/// A write batch together with what committing it completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedBatch {
    pub batch: WriteBatch,
    /// Keys whose entity upsert is part of this batch.
    pub keys_completed: Vec<String>,
    pub history_entries: usize,
}

impl PlannedBatch {
    fn push_history(&mut self, op: WriteOp) {
        self.batch.push(op);
        self.history_entries += 1;
    }

    fn push_entity(&mut self, natural_key: String, op: WriteOp) {
        self.batch.push(op);
        self.keys_completed.push(natural_key);
    }
}

/// Packs entity writes into batches of at most `max_operations` operations.
///
/// A key's entity upsert and history entries share one batch whenever they fit in an
/// empty batch. The current batch is flushed first when they do not fit in what is left.
/// A key too large for any batch gets dedicated batches: history chunks first and the
/// entity upsert last, so the entity only appears once its history is complete.
pub fn plan_batches(writes: Vec<EntityWrite>, max_operations: usize) -> Vec<PlannedBatch> {
    let max_operations = max_operations.max(1);
    let mut planned = Vec::new();
    let mut current = PlannedBatch::default();

    for write in writes {
        let operations = write.operation_count();

        if operations > max_operations {
            flush(&mut planned, &mut current);
            plan_oversized(&mut planned, write, max_operations);
            continue;
        }

        if current.batch.len() + operations > max_operations {
            flush(&mut planned, &mut current);
        }
        append(&mut current, write);
    }

    flush(&mut planned, &mut current);

    planned
}

fn append(batch: &mut PlannedBatch, write: EntityWrite) {
    let EntityWrite {
        natural_key,
        document,
        history,
    } = write;

    for entry in &history {
        batch.push_history(WriteOp::history(&natural_key, entry));
    }
    let entity = WriteOp::UpsertEntity {
        natural_key: natural_key.clone(),
        document,
    };
    batch.push_entity(natural_key, entity);
}

fn plan_oversized(planned: &mut Vec<PlannedBatch>, write: EntityWrite, max_operations: usize) {
    let mut current = PlannedBatch::default();

    for entry in &write.history {
        if current.batch.len() == max_operations {
            flush(planned, &mut current);
        }
        current.push_history(WriteOp::history(&write.natural_key, entry));
    }
    if current.batch.len() == max_operations {
        flush(planned, &mut current);
    }

    let entity = WriteOp::UpsertEntity {
        natural_key: write.natural_key.clone(),
        document: write.document,
    };
    current.push_entity(write.natural_key, entity);
    flush(planned, &mut current);
}

fn flush(planned: &mut Vec<PlannedBatch>, current: &mut PlannedBatch) {
    if !current.batch.is_empty() {
        planned.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::entity_write;

    fn sizes(planned: &[PlannedBatch]) -> Vec<usize> {
        planned.iter().map(|p| p.batch.len()).collect()
    }

    #[test]
    fn flushes_before_a_key_that_does_not_fit() {
        let writes = vec![entity_write("A", 2), entity_write("B", 2), entity_write("C", 1)];

        let planned = plan_batches(writes, 5);

        assert_eq!(sizes(&planned), vec![3, 5]);
        assert_eq!(planned[0].keys_completed, vec!["A".to_string()]);
        assert_eq!(
            planned[1].keys_completed,
            vec!["B".to_string(), "C".to_string()]
        );
        assert_eq!(planned[1].history_entries, 3);
    }

    #[test]
    fn keys_are_never_split_when_they_fit() {
        let writes: Vec<_> = (0..40)
            .map(|i| entity_write(&format!("K{i:02}"), i % 7))
            .collect();

        for batch in plan_batches(writes, 10) {
            let mut keys: Vec<&str> = batch.batch.ops().iter().map(WriteOp::natural_key).collect();
            keys.dedup();
            assert_eq!(keys.len(), batch.keys_completed.len());
            assert!(batch.batch.len() <= 10);
        }
    }

    #[test]
    fn oversized_key_commits_entity_last() {
        let writes = vec![entity_write("A", 1), entity_write("BIG", 9), entity_write("C", 0)];

        let planned = plan_batches(writes, 4);

        assert_eq!(sizes(&planned), vec![2, 4, 4, 2, 1]);
        assert!(planned[1].keys_completed.is_empty());
        assert!(planned[2].keys_completed.is_empty());
        assert_eq!(planned[3].keys_completed, vec!["BIG".to_string()]);
        assert!(matches!(
            planned[3].batch.ops().last(),
            Some(WriteOp::UpsertEntity { natural_key, .. }) if natural_key == "BIG"
        ));
        assert_eq!(planned[4].keys_completed, vec!["C".to_string()]);
    }

    #[test]
    fn oversized_key_with_full_last_chunk_gets_an_entity_batch() {
        let planned = plan_batches(vec![entity_write("BIG", 8)], 4);

        assert_eq!(sizes(&planned), vec![4, 4, 1]);
        assert_eq!(planned[2].keys_completed, vec!["BIG".to_string()]);
    }
}
