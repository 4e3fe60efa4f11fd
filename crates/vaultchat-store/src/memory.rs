//! In-memory document store.
//!
//! The default backend for tests, demos, and embedding scenarios that do
//! not need persistence. Collections live in a single `RwLock`ed map;
//! batch commits stage their writes on clones of the touched collections
//! so a failing op leaves the live state untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::DocumentStore;
use crate::batch::{WriteBatch, WriteOp};
use crate::document::{self, Document, StoredDocument};
use crate::error::{Result, StoreError};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::query::{self, Query};

type Collections = HashMap<String, BTreeMap<String, Document>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    collections: RwLock<Collections>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>> {
        self.inner.collections.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.inner.collections.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|coll| coll.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), body);
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn set_merge(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        {
            let mut collections = self.write()?;
            let coll = collections.entry(collection.to_string()).or_default();
            match coll.get_mut(id) {
                Some(existing) => document::merge(existing, body),
                None => {
                    coll.insert(id.to_string(), body);
                }
            }
        }
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        {
            let mut collections = self.write()?;
            let existing = collections
                .get_mut(collection)
                .and_then(|coll| coll.get_mut(id))
                .ok_or(StoreError::NotFound)?;
            document::merge(existing, fields);
        }
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self
            .write()?
            .get_mut(collection)
            .and_then(|coll| coll.remove(id))
            .is_some();
        if removed {
            self.inner.notifier.notify(ChangeEvent::deleted(collection, id));
        }
        Ok(())
    }

    async fn query(&self, q: &Query) -> Result<Vec<StoredDocument>> {
        let mut docs: Vec<StoredDocument> = self
            .read()?
            .get(&q.collection)
            .map(|coll| {
                coll.iter()
                    .filter(|(_, body)| query::matches(body, &q.filters))
                    .map(|(id, body)| StoredDocument {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        query::sort_and_truncate(&mut docs, q);
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let ops = batch.into_ops();
        if ops.is_empty() {
            return Ok(());
        }

        let mut events = Vec::with_capacity(ops.len());
        {
            let mut collections = self.write()?;

            let mut staged: Collections = HashMap::new();
            for op in &ops {
                let name = op_collection(op);
                if !staged.contains_key(name) {
                    staged.insert(
                        name.to_string(),
                        collections.get(name).cloned().unwrap_or_default(),
                    );
                }
            }

            for op in ops {
                match op {
                    WriteOp::Set { collection, id, body } => {
                        staged.entry(collection.clone()).or_default().insert(id.clone(), body);
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::SetMerge { collection, id, body } => {
                        let coll = staged.entry(collection.clone()).or_default();
                        match coll.get_mut(&id) {
                            Some(existing) => document::merge(existing, body),
                            None => {
                                coll.insert(id.clone(), body);
                            }
                        }
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::Update { collection, id, fields } => {
                        let existing = staged
                            .get_mut(&collection)
                            .and_then(|coll| coll.get_mut(&id))
                            .ok_or(StoreError::NotFound)?;
                        document::merge(existing, fields);
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::Delete { collection, id } => {
                        let removed = staged
                            .get_mut(&collection)
                            .and_then(|coll| coll.remove(&id))
                            .is_some();
                        if removed {
                            events.push(ChangeEvent::deleted(collection, id));
                        }
                    }
                }
            }

            for (name, coll) in staged {
                collections.insert(name, coll);
            }
        }

        for event in events {
            self.inner.notifier.notify(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.notifier.subscribe()
    }
}

fn op_collection(op: &WriteOp) -> &str {
    match op {
        WriteOp::Set { collection, .. }
        | WriteOp::SetMerge { collection, .. }
        | WriteOp::Update { collection, .. }
        | WriteOp::Delete { collection, .. } => collection,
    }
}
