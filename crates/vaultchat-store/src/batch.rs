//! Atomic multi-document writes.

use crate::document::Document;

/// A single operation inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or replace the whole document.
    Set {
        collection: String,
        id: String,
        body: Document,
    },
    /// Create the document or merge fields into the existing one.
    SetMerge {
        collection: String,
        id: String,
        body: Document,
    },
    /// Merge fields into an existing document; fails the batch if the
    /// document is absent.
    Update {
        collection: String,
        id: String,
        fields: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// An ordered set of writes committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: impl Into<String>, id: impl Into<String>, body: Document) {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            body,
        });
    }

    pub fn set_merge(&mut self, collection: impl Into<String>, id: impl Into<String>, body: Document) {
        self.ops.push(WriteOp::SetMerge {
            collection: collection.into(),
            id: id.into(),
            body,
        });
    }

    pub fn update(&mut self, collection: impl Into<String>, id: impl Into<String>, fields: Document) {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
