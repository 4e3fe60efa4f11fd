//! SQLite-backed document store.
//!
//! Documents are rows in a single `documents` table, the body stored as
//! JSON text. Predicates run in Rust over the collection scan so results
//! rank exactly like the in-memory store's.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, params};
use tokio::sync::broadcast;
use tracing::info;

use crate::DocumentStore;
use crate::batch::{WriteBatch, WriteOp};
use crate::document::{self, Document, StoredDocument};
use crate::error::{Result, StoreError};
use crate::migrations;
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::query::{self, Query};

#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<SqliteInner>,
}

struct SqliteInner {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(SqliteInner {
                conn: Mutex::new(conn),
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.inner.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.inner.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| read_doc(conn, collection, id))
    }

    async fn set(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        self.with_conn(|conn| upsert(conn, collection, id, &body))?;
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn set_merge(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        self.with_conn(|conn| {
            let merged = match read_doc(conn, collection, id)? {
                Some(mut existing) => {
                    document::merge(&mut existing, body);
                    existing
                }
                None => body,
            };
            upsert(conn, collection, id, &merged)
        })?;
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        self.with_conn(|conn| {
            let mut existing = read_doc(conn, collection, id)?.ok_or(StoreError::NotFound)?;
            document::merge(&mut existing, fields);
            upsert(conn, collection, id, &existing)
        })?;
        self.inner.notifier.notify(ChangeEvent::written(collection, id));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )? > 0)
        })?;
        if removed {
            self.inner.notifier.notify(ChangeEvent::deleted(collection, id));
        }
        Ok(())
    }

    async fn query(&self, q: &Query) -> Result<Vec<StoredDocument>> {
        let mut docs = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, body FROM documents WHERE collection = ?1",
            )?;
            let rows = stmt.query_map(params![q.collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut docs = Vec::new();
            for row in rows {
                let (id, body) = row?;
                let body: Document = serde_json::from_str(&body)?;
                if query::matches(&body, &q.filters) {
                    docs.push(StoredDocument { id, body });
                }
            }
            Ok(docs)
        })?;

        query::sort_and_truncate(&mut docs, q);
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let ops = batch.into_ops();
        if ops.is_empty() {
            return Ok(());
        }

        let events = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut events = Vec::with_capacity(ops.len());

            for op in &ops {
                match op {
                    WriteOp::Set { collection, id, body } => {
                        upsert(&tx, collection, id, body)?;
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::SetMerge { collection, id, body } => {
                        let merged = match read_doc(&tx, collection, id)? {
                            Some(mut existing) => {
                                document::merge(&mut existing, body.clone());
                                existing
                            }
                            None => body.clone(),
                        };
                        upsert(&tx, collection, id, &merged)?;
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::Update { collection, id, fields } => {
                        let mut existing =
                            read_doc(&tx, collection, id)?.ok_or(StoreError::NotFound)?;
                        document::merge(&mut existing, fields.clone());
                        upsert(&tx, collection, id, &existing)?;
                        events.push(ChangeEvent::written(collection, id));
                    }
                    WriteOp::Delete { collection, id } => {
                        let removed = tx.execute(
                            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                            params![collection, id],
                        )? > 0;
                        if removed {
                            events.push(ChangeEvent::deleted(collection, id));
                        }
                    }
                }
            }

            tx.commit()?;
            Ok(events)
        })?;

        for event in events {
            self.inner.notifier.notify(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.notifier.subscribe()
    }
}

fn read_doc(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
    match conn.query_row(
        "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
        params![collection, id],
        |row| row.get::<_, String>(0),
    ) {
        Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn upsert(conn: &Connection, collection: &str, id: &str, body: &Document) -> Result<()> {
    conn.execute(
        "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
         ON CONFLICT(collection, id)
         DO UPDATE SET body = excluded.body, updated_at = datetime('now')",
        params![collection, id, serde_json::to_string(body)?],
    )?;
    Ok(())
}
