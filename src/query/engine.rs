//! Federated query engine
//!
//! Answers an [`ArticleQuery`] in up to two round trips:
//! 1. one text-index lookup, when the query has text filters or asks for
//!    content, producing candidate ids (and content, in the same call)
//! 2. one compiled graph query, restricted to those ids
//!
//! Node content lives only in the text index; `NODE_WITH_CONTENT` results are
//! projected as plain nodes by the graph store and backfilled afterwards.

use crate::query::compiler::QueryBuilder;
use crate::query::model::{
    ArticleLink, ArticleNode, ArticleQuery, GraphFilter, ReturnType, SearchResponse,
};
use crate::storage::{GraphStore, Row, StorageError, TextIndex};
use crate::{Result, RippleError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LinkRow {
    article_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    article_id: i64,
    title: String,
    #[serde(default)]
    categories: Option<BTreeSet<String>>,
    #[serde(default)]
    links: Vec<LinkRow>,
}

impl From<NodeRow> for ArticleNode {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.article_id,
            title: row.title,
            categories: row.categories.unwrap_or_default(),
            links: row
                .links
                .into_iter()
                .map(|link| ArticleLink {
                    id: link.article_id,
                    title: link.title,
                })
                .collect(),
            content: None,
        }
    }
}

/// Runs article queries across the text index and the graph store
pub struct QueryEngine {
    graph: Arc<dyn GraphStore>,
    text: Arc<dyn TextIndex>,
}

impl QueryEngine {
    pub fn new(graph: Arc<dyn GraphStore>, text: Arc<dyn TextIndex>) -> Self {
        Self { graph, text }
    }

    /// Processes one query end to end
    ///
    /// # Arguments
    ///
    /// * `query` - The structured query
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - Rows shaped by the requested return type
    /// * `Err(RippleError::InvalidArgument)` - The request itself is malformed
    /// * `Err(RippleError::AssertionFailed)` - A node came back without content
    pub async fn process(&self, query: &ArticleQuery) -> Result<SearchResponse> {
        query.validate().map_err(RippleError::InvalidArgument)?;

        let wants_content = query.return_type == ReturnType::NodeWithContent;
        let mut contents: HashMap<i64, String> = HashMap::new();
        let mut builder = QueryBuilder::articles();

        if query.needs_text_lookup() {
            let hits = self.text.search(&query.text_filters, wants_content).await?;
            debug!("Text index matched {} articles", hits.len());

            let ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();
            if wants_content {
                contents = hits
                    .into_iter()
                    .filter_map(|hit| hit.content.map(|content| (hit.id, content)))
                    .collect();
            }
            builder = builder.text_ids_filter(ids);
        }

        for filter in &query.graph_filters {
            builder = match filter {
                GraphFilter::Distance(f) => builder.distance_filter(f.clone()),
                GraphFilter::LinksCount(f) => builder.links_count_filter(f.clone()),
            };
        }

        for filter in &query.general_filters {
            builder = builder.general_filter(filter.clone());
        }

        if let Some(sort) = query.sort {
            builder = builder.sort_by(sort);
        }

        builder = builder.return_type(query.return_type.graph_projection());

        if query.skip > 0 {
            builder = builder.skip(query.skip);
        }
        if let Some(limit) = query.limit {
            builder = builder.limit(limit);
        }

        let compiled = builder.build()?;
        debug!("Compiled graph query:\n{}", compiled.text());

        let rows = self.graph.execute(&compiled).await?;
        let mut response = shape(query.return_type, rows)?;

        if wants_content {
            if let SearchResponse::Nodes { nodes } = &mut response {
                for node in nodes.iter_mut() {
                    let content = contents.get(&node.id).cloned().ok_or_else(|| {
                        RippleError::AssertionFailed(format!(
                            "article {} ('{}') has no content from the text lookup",
                            node.id, node.title
                        ))
                    })?;
                    node.content = Some(content);
                }
            }
        }

        Ok(response)
    }
}

fn malformed(column: &str) -> StorageError {
    StorageError::Serialization(format!("graph row is missing a valid '{}' column", column))
}

fn column<'a>(row: &'a Row, name: &str) -> std::result::Result<&'a Value, StorageError> {
    row.get(name).ok_or_else(|| malformed(name))
}

/// Converts raw graph rows into the response for `return_type`
fn shape(return_type: ReturnType, rows: Vec<Row>) -> Result<SearchResponse> {
    let response = match return_type {
        ReturnType::Count => {
            let count = match rows.first() {
                Some(row) => column(row, "count")?
                    .as_u64()
                    .ok_or_else(|| malformed("count"))?,
                None => 0,
            };
            SearchResponse::Count { count }
        }
        ReturnType::Id => {
            let ids = rows
                .iter()
                .map(|row| column(row, "id")?.as_i64().ok_or_else(|| malformed("id")))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            SearchResponse::Ids { ids }
        }
        ReturnType::Title => {
            let titles = rows
                .iter()
                .map(|row| {
                    column(row, "title")?
                        .as_str()
                        .map(String::from)
                        .ok_or_else(|| malformed("title"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            SearchResponse::Titles { titles }
        }
        ReturnType::Node | ReturnType::NodeWithContent => {
            let nodes = rows
                .into_iter()
                .map(|mut row| {
                    let node = row.remove("node").ok_or_else(|| malformed("node"))?;
                    let node: NodeRow = serde_json::from_value(node)
                        .map_err(|e| StorageError::Serialization(e.to_string()))?;
                    Ok(ArticleNode::from(node))
                })
                .collect::<std::result::Result<Vec<_>, StorageError>>()?;
            SearchResponse::Nodes { nodes }
        }
    };

    Ok(response)
}
