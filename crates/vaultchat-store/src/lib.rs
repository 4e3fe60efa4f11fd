//! Document storage for the chat core.
//!
//! The coordination service talks to storage through the [`DocumentStore`]
//! trait: schemaless documents grouped into named collections, atomic
//! multi-document batches, equality/range queries, and a change feed that
//! backs live subscriptions. Two implementations ship here (in-memory and
//! SQLite-backed), and any remote document database can be slotted in by
//! implementing the same trait.

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod notify;
pub mod query;
pub mod sqlite;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use batch::{WriteBatch, WriteOp};
pub use config::StoreConfig;
pub use document::{Document, DocumentExt, StoredDocument, from_document, merge, to_document};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier};
pub use query::{Direction, Filter, Query};
pub use sqlite::SqliteStore;

/// A document database: named collections of id-addressed JSON documents.
///
/// Implementations are cheap-clone handles over shared state, so a store
/// can be handed to several services and background tasks at once.
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Fetch one document, `None` if absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, body: Document) -> Result<()>;

    /// Create a document or merge fields into the existing one.
    async fn set_merge(&self, collection: &str, id: &str, body: Document) -> Result<()>;

    /// Merge fields into an existing document; `NotFound` if absent.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()>;

    /// Remove a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Run a filtered, ordered, limited collection query.
    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>>;

    /// Apply a batch atomically: either every op lands or none do.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Subscribe to the store-wide change feed.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}
