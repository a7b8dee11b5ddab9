//! SQLite text index
//!
//! This module provides a SQLite FTS5 implementation of the [`TextIndex`] trait.

use crate::query::{BoolOp, TextSearchFilter};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TextHit, TextIndex};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// FTS5-backed full-text index
pub struct SqliteTextIndex {
    conn: Mutex<Connection>,
}

impl SqliteTextIndex {
    /// Opens or creates the index database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory index (tests and ephemeral runs)
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of indexed documents
    pub fn document_count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Categories stored for `id`, if indexed
    pub fn categories_of(&self, id: i64) -> StorageResult<Option<Vec<String>>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT categories FROM articles WHERE rowid = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

#[async_trait]
impl TextIndex for SqliteTextIndex {
    async fn index_document(
        &self,
        id: i64,
        title: &str,
        content: &str,
        categories: &[String],
    ) -> StorageResult<()> {
        let categories = serde_json::to_string(categories)?;
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM articles WHERE rowid = ?1", params![id])?;
        tx.execute(
            "INSERT INTO articles (rowid, article_id, title, content, categories) \
             VALUES (?1, ?1, ?2, ?3, ?4)",
            params![id, title, content, categories],
        )?;
        tx.commit()?;

        Ok(())
    }

    async fn search(
        &self,
        filters: &[TextSearchFilter],
        with_content: bool,
    ) -> StorageResult<Vec<TextHit>> {
        let columns = if with_content {
            "article_id, content"
        } else {
            "article_id, NULL"
        };
        let conn = self.conn()?;

        let hits = match match_expression(filters) {
            Some(expression) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles WHERE articles MATCH ?1 ORDER BY rowid",
                    columns
                ))?;
                let rows = stmt.query_map(params![expression], hit_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM articles ORDER BY rowid", columns))?;
                let rows = stmt.query_map([], hit_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(hits)
    }

    async fn truncate(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM articles", [])?;
        Ok(())
    }
}

fn hit_from_row(row: &Row<'_>) -> rusqlite::Result<TextHit> {
    Ok(TextHit {
        id: row.get(0)?,
        content: row.get(1)?,
    })
}

/// Builds one FTS5 MATCH expression ANDing every filter
///
/// Returns `None` when no filter carries a term.
fn match_expression(filters: &[TextSearchFilter]) -> Option<String> {
    let clauses: Vec<String> = filters.iter().filter_map(filter_clause).collect();

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn filter_clause(filter: &TextSearchFilter) -> Option<String> {
    let joiner = match filter.bool_op {
        BoolOp::And => " AND ",
        BoolOp::Or => " OR ",
    };

    let terms: Vec<String> = filter
        .matches
        .split_whitespace()
        .map(|term| quote_term(term, filter.fuzzy))
        .collect();

    if terms.is_empty() {
        return None;
    }

    Some(format!("({} : ({}))", filter.field.column(), terms.join(joiner)))
}

fn quote_term(term: &str, prefix: bool) -> String {
    let quoted = format!("\"{}\"", term.replace('"', "\"\""));
    if prefix {
        quoted + "*"
    } else {
        quoted
    }
}
