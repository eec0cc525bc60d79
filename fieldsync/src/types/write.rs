use crate::types::{Document, HistoryEntry};

/// One merge-upsert against the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    UpsertEntity {
        natural_key: String,
        document: Document,
    },
    UpsertHistory {
        natural_key: String,
        entry_id: String,
        sequence: u32,
        document: Document,
    },
}

impl WriteOp {
    pub fn history(natural_key: &str, entry: &HistoryEntry) -> Self {
        WriteOp::UpsertHistory {
            natural_key: natural_key.to_string(),
            entry_id: entry.id.clone(),
            sequence: entry.sequence,
            document: entry.to_document(),
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            WriteOp::UpsertEntity { natural_key, .. } => natural_key,
            WriteOp::UpsertHistory { natural_key, .. } => natural_key,
        }
    }
}

/// Operations the destination applies atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }
}
