//! Text index schema definitions
//!
//! This module contains the SQL schema for the Wiki-Ripple text index.

/// SQL schema for the text index
///
/// `unicode61` with `remove_diacritics 2` folds accented letters onto their
/// ASCII base, so "Zürich" and "Zurich" index to the same token.
pub const SCHEMA_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS articles USING fts5(
    article_id UNINDEXED,
    title,
    content,
    categories UNINDEXED,
    tokenize = 'unicode61 remove_diacritics 2'
);
"#;

/// Initializes the text index schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
