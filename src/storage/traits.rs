//! Storage traits and error types
//!
//! This module defines the contracts the importer and the query engine
//! consume from the graph store and the text index.

use crate::query::{CompiledQuery, TextSearchFilter};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Relationship from article {source_id} to '{dest_title}' was not created")]
    RelationshipNotCreated { source_id: i64, dest_title: String },

    #[error("Graph query failed ({code}): {message}")]
    Query { code: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported by this store: {0}")]
    Unsupported(String),

    #[error("Storage lock poisoned: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One result row of a graph query, keyed by projection alias
pub type Row = serde_json::Map<String, serde_json::Value>;

/// What an upsert-and-link call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub node_created: bool,
    pub relationship_created: bool,
}

/// One text-index match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHit {
    pub id: i64,

    /// Present only when the search asked for content
    pub content: Option<String>,
}

/// Graph store holding article nodes and `Link` relationships
///
/// Implementations must be safe to share between the import run and
/// concurrent queries.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// Creates the article node unless one with `id` exists
    ///
    /// # Returns
    ///
    /// Whether a node was created
    async fn upsert_article(&self, id: i64, title: &str, categories: &[String])
        -> StorageResult<bool>;

    /// Ensures the destination node and the `source -> dest` relationship exist
    ///
    /// Re-applying the same arguments never duplicates the relationship. A call
    /// that creates nothing is not an error.
    async fn upsert_and_link_article(
        &self,
        source_id: i64,
        dest_id: i64,
        dest_title: &str,
        dest_categories: &[String],
    ) -> StorageResult<UpsertOutcome>;

    /// Links two existing nodes, the destination looked up by title
    ///
    /// Fails with [`StorageError::RelationshipNotCreated`] when no new
    /// relationship resulted (missing endpoint or already linked).
    async fn link_by_title(&self, source_id: i64, dest_title: &str) -> StorageResult<()>;

    /// Runs a compiled query and returns its rows in order
    async fn execute(&self, query: &CompiledQuery) -> StorageResult<Vec<Row>>;

    /// Deletes every node and relationship
    async fn truncate(&self) -> StorageResult<()>;
}

/// Full-text index over article title and content
#[async_trait]
pub trait TextIndex: Send + Sync + 'static {
    /// Adds or replaces the document for `id`
    async fn index_document(
        &self,
        id: i64,
        title: &str,
        content: &str,
        categories: &[String],
    ) -> StorageResult<()>;

    /// Ids (and optionally content) of documents matching every filter
    ///
    /// An empty filter list matches every document.
    async fn search(
        &self,
        filters: &[TextSearchFilter],
        with_content: bool,
    ) -> StorageResult<Vec<TextHit>>;

    /// Deletes every document
    async fn truncate(&self) -> StorageResult<()>;
}
