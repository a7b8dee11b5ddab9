//! Query request and response types
//!
//! These are plain value objects. The compiler and engine read them and never
//! mutate them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Shape of the rows a query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    Count,
    Id,
    Title,
    Node,
    /// `Node` plus article content backfilled from the text index
    NodeWithContent,
}

impl ReturnType {
    /// The projection actually compiled for the graph store
    pub fn graph_projection(self) -> Self {
        match self {
            Self::NodeWithContent => Self::Node,
            other => other,
        }
    }
}

/// Text-index field a text filter searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextField {
    Title,
    Content,
}

impl TextField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
        }
    }
}

/// How the terms of one text filter combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

/// Full-text predicate, evaluated by the text index only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearchFilter {
    pub field: TextField,

    /// Prefix-match each term instead of requiring whole tokens
    #[serde(default)]
    pub fuzzy: bool,

    #[serde(default)]
    pub bool_op: BoolOp,

    /// Whitespace-separated search terms
    pub matches: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceStrategy {
    /// Exactly `dist` hops away
    AtDist,
    /// Between 1 and `dist` hops away
    #[default]
    UpToDist,
}

/// Nodes reachable from `source_title` along outbound links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceFilter {
    pub source_title: String,
    pub dist: u32,
    #[serde(default)]
    pub strategy: DistanceStrategy,
}

/// Outbound link count within `[min, max]`
///
/// With `categories`, only links to nodes carrying every listed category count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksCountFilter {
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

/// Predicates only the graph store can evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphFilter {
    Distance(DistanceFilter),
    LinksCount(LinksCountFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdsFilter {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlesFilter {
    pub titles: Vec<String>,
}

/// Matches nodes carrying any of `categories`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesFilter {
    pub categories: Vec<String>,
}

/// Store-agnostic predicates over id, title and category membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneralFilter {
    Ids(IdsFilter),
    Titles(TitlesFilter),
    Categories(CategoriesFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    Id,
    Title,
    LinkCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub by: SortBy,
    #[serde(default)]
    pub dir: SortDirection,
}

/// A structured article query
///
/// Text filters always run first (against the text index); graph filters and
/// general filters are then applied in request order. All filters are ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleQuery {
    pub return_type: ReturnType,
    #[serde(default)]
    pub text_filters: Vec<TextSearchFilter>,
    #[serde(default)]
    pub graph_filters: Vec<GraphFilter>,
    #[serde(default)]
    pub general_filters: Vec<GeneralFilter>,
    #[serde(default)]
    pub sort: Option<Sort>,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl ArticleQuery {
    pub fn new(return_type: ReturnType) -> Self {
        Self {
            return_type,
            text_filters: Vec::new(),
            graph_filters: Vec::new(),
            general_filters: Vec::new(),
            sort: None,
            skip: 0,
            limit: None,
        }
    }

    /// Whether the text index must be consulted before the graph store
    pub fn needs_text_lookup(&self) -> bool {
        !self.text_filters.is_empty() || self.return_type == ReturnType::NodeWithContent
    }

    /// Checks request-level constraints the types cannot express
    pub fn validate(&self) -> Result<(), String> {
        for filter in &self.text_filters {
            if filter.matches.split_whitespace().next().is_none() {
                return Err("text filter has no search terms".to_string());
            }
        }

        for filter in &self.graph_filters {
            match filter {
                GraphFilter::Distance(d) if d.source_title.is_empty() => {
                    return Err("distance filter needs a source title".to_string());
                }
                GraphFilter::LinksCount(LinksCountFilter {
                    min, max: Some(max), ..
                }) if max < min => {
                    return Err(format!(
                        "links count filter max ({}) is below min ({})",
                        max, min
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Outbound neighbor of an [`ArticleNode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub id: i64,
    pub title: String,
}

/// Read projection of one graph-store article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleNode {
    pub id: i64,
    pub title: String,
    pub categories: BTreeSet<String>,
    pub links: Vec<ArticleLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Query result, shaped by the requested return type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchResponse {
    Count { count: u64 },
    Ids { ids: Vec<i64> },
    Titles { titles: Vec<String> },
    Nodes { nodes: Vec<ArticleNode> },
}

impl SearchResponse {
    /// Number of result rows (the count itself for `Count`)
    pub fn len(&self) -> usize {
        match self {
            Self::Count { count } => *count as usize,
            Self::Ids { ids } => ids.len(),
            Self::Titles { titles } => titles.len(),
            Self::Nodes { nodes } => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
