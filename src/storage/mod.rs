//! Storage module for imported articles
//!
//! This module handles both stores an import writes to:
//! - the graph store (article nodes and `Link` relationships), backed by
//!   Neo4j over HTTP or held in memory
//! - the SQLite FTS5 text index over article title and content
//!
//! The two stores are independent; there is no cross-store transaction.

mod memory;
mod neo4j;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryGraphStore;
pub use neo4j::Neo4jGraphStore;
pub use sqlite::SqliteTextIndex;
pub use traits::{
    GraphStore, Row, StorageError, StorageResult, TextHit, TextIndex, UpsertOutcome,
};

use crate::config::{GraphBackend, GraphConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Opens the configured graph store
///
/// # Arguments
///
/// * `config` - Graph store configuration
/// * `timeout` - Per-request timeout for remote stores
///
/// # Returns
///
/// * `Ok(Arc<dyn GraphStore>)` - Store ready for writes and queries
/// * `Err(StorageError)` - Client construction or schema setup failed
pub async fn open_graph_store(
    config: &GraphConfig,
    timeout: Duration,
) -> StorageResult<Arc<dyn GraphStore>> {
    match config.backend {
        GraphBackend::Memory => Ok(Arc::new(MemoryGraphStore::new())),
        GraphBackend::Neo4j => {
            let store = Neo4jGraphStore::new(config, timeout)?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Opens or creates the text index database
pub fn open_text_index(path: &Path) -> StorageResult<SqliteTextIndex> {
    SqliteTextIndex::new(path)
}
