//! Graph query compiler
//!
//! A [`QueryBuilder`] is an ordered list of [`Stage`]s. Each builder method
//! consumes the builder and returns a new one with the stage appended, so a
//! partially built query can be cloned and branched freely.
//!
//! [`QueryBuilder::build`] checks the stage order and then folds the stages
//! into one Cypher text, concatenated in call order. Every stage that binds
//! parameters gets a fresh namespace index from a counter threaded through the
//! fold, so repeating a filter never collides parameter names.

use crate::query::model::{
    DistanceFilter, DistanceStrategy, GeneralFilter, LinksCountFilter, ReturnType, Sort, SortBy,
    SortDirection,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Named parameters bound by a compiled query
pub type Parameters = BTreeMap<String, Value>;

/// Errors raised when the stage sequence cannot form a valid query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryShapeError {
    #[error("Query has no stages")]
    Empty,

    #[error("Query must start with the article match stage")]
    MissingBaseMatch,

    #[error("Query has no return-type stage")]
    MissingProjection,

    #[error("{stage} stage is not allowed at position {position}")]
    MisplacedStage { stage: &'static str, position: usize },

    #[error("Duplicate {stage} stage at position {position}")]
    DuplicateStage { stage: &'static str, position: usize },

    #[error("NODE_WITH_CONTENT cannot be compiled; project NODE and backfill content")]
    ContentProjection,
}

/// One step of a graph query
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    MatchArticles,
    TextIds(Vec<i64>),
    General(GeneralFilter),
    Distance(DistanceFilter),
    LinksCount(LinksCountFilter),
    SortBy(Sort),
    Return(ReturnType),
    Skip(u64),
    Limit(u64),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MatchArticles => "article match",
            Self::TextIds(_) => "text ids filter",
            Self::General(GeneralFilter::Ids(_)) => "ids filter",
            Self::General(GeneralFilter::Titles(_)) => "titles filter",
            Self::General(GeneralFilter::Categories(_)) => "categories filter",
            Self::Distance(_) => "distance filter",
            Self::LinksCount(_) => "links count filter",
            Self::SortBy(_) => "sort",
            Self::Return(_) => "return type",
            Self::Skip(_) => "skip",
            Self::Limit(_) => "limit",
        }
    }

    fn is_filter(&self) -> bool {
        matches!(
            self,
            Self::TextIds(_) | Self::General(_) | Self::Distance(_) | Self::LinksCount(_)
        )
    }
}

/// A ready-to-run graph query
///
/// Keeps the validated stage plan next to the Cypher text so that stores
/// without a Cypher engine can evaluate the same query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    text: String,
    parameters: Parameters,
    plan: Vec<Stage>,
}

impl CompiledQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn plan(&self) -> &[Stage] {
        &self.plan
    }

    /// The projection stage of the plan
    pub fn return_type(&self) -> Option<ReturnType> {
        self.plan.iter().find_map(|stage| match stage {
            Stage::Return(return_type) => Some(*return_type),
            _ => None,
        })
    }
}

/// Next free parameter namespace index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParamIndex(usize);

impl ParamIndex {
    fn name(self, base: &str) -> String {
        format!("{}_{}", base, self.0)
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Cypher text and parameters emitted by one stage
struct Fragment {
    text: String,
    parameters: Vec<(String, Value)>,
}

impl Fragment {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }
}

/// Immutable, chainable query builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    stages: Vec<Stage>,
}

impl QueryBuilder {
    /// A builder with no stages
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder starting from every article node
    pub fn articles() -> Self {
        Self::new().stage(Stage::MatchArticles)
    }

    /// Appends an arbitrary stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn general_filter(self, filter: GeneralFilter) -> Self {
        self.stage(Stage::General(filter))
    }

    /// Restricts to ids produced by the text index
    pub(crate) fn text_ids_filter(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.stage(Stage::TextIds(ids.into_iter().collect()))
    }

    pub fn distance_filter(self, filter: DistanceFilter) -> Self {
        self.stage(Stage::Distance(filter))
    }

    pub fn links_count_filter(self, filter: LinksCountFilter) -> Self {
        self.stage(Stage::LinksCount(filter))
    }

    pub fn sort_by(self, sort: Sort) -> Self {
        self.stage(Stage::SortBy(sort))
    }

    pub fn return_type(self, return_type: ReturnType) -> Self {
        self.stage(Stage::Return(return_type))
    }

    pub fn skip(self, count: u64) -> Self {
        self.stage(Stage::Skip(count))
    }

    pub fn limit(self, count: u64) -> Self {
        self.stage(Stage::Limit(count))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Validates the stage order and compiles the query
    ///
    /// # Returns
    ///
    /// The Cypher text with its parameters, or the first shape violation found
    pub fn build(&self) -> Result<CompiledQuery, QueryShapeError> {
        validate_shape(&self.stages)?;

        let mut index = ParamIndex(0);
        let mut sort = None;
        let mut lines = Vec::with_capacity(self.stages.len());
        let mut parameters = Parameters::new();

        for stage in &self.stages {
            let (fragment, next) = emit(stage, index, sort);
            index = next;
            if let Stage::SortBy(s) = stage {
                sort = Some(s.dir);
            }

            lines.push(fragment.text);
            parameters.extend(fragment.parameters);
        }

        Ok(CompiledQuery {
            text: lines.join("\n"),
            parameters,
            plan: self.stages.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Filtering,
    Sorted,
    Projected,
    Skipped,
    Limited,
}

fn validate_shape(stages: &[Stage]) -> Result<(), QueryShapeError> {
    match stages.first() {
        None => return Err(QueryShapeError::Empty),
        Some(Stage::MatchArticles) => {}
        Some(_) => return Err(QueryShapeError::MissingBaseMatch),
    }

    let mut phase = Phase::Filtering;

    for (position, stage) in stages.iter().enumerate().skip(1) {
        let misplaced = QueryShapeError::MisplacedStage {
            stage: stage.name(),
            position,
        };
        let duplicate = QueryShapeError::DuplicateStage {
            stage: stage.name(),
            position,
        };

        phase = match (stage, phase) {
            (Stage::MatchArticles, _) => return Err(misplaced),
            (s, Phase::Filtering) if s.is_filter() => Phase::Filtering,
            (s, _) if s.is_filter() => return Err(misplaced),
            (Stage::SortBy(_), Phase::Filtering) => Phase::Sorted,
            (Stage::SortBy(_), Phase::Sorted) => return Err(duplicate),
            (Stage::SortBy(_), _) => return Err(misplaced),
            (Stage::Return(ReturnType::NodeWithContent), _) => {
                return Err(QueryShapeError::ContentProjection)
            }
            (Stage::Return(_), Phase::Filtering | Phase::Sorted) => Phase::Projected,
            (Stage::Return(_), _) => return Err(duplicate),
            (Stage::Skip(_), Phase::Projected) => Phase::Skipped,
            (Stage::Skip(_), Phase::Skipped) => return Err(duplicate),
            (Stage::Limit(_), Phase::Projected | Phase::Skipped) => Phase::Limited,
            (Stage::Limit(_), Phase::Limited) => return Err(duplicate),
            (Stage::Skip(_) | Stage::Limit(_), _) => return Err(misplaced),
            _ => return Err(misplaced),
        };
    }

    match phase {
        Phase::Filtering | Phase::Sorted => Err(QueryShapeError::MissingProjection),
        _ => Ok(()),
    }
}

/// Emits one stage
///
/// # Arguments
///
/// * `stage` - The stage to compile
/// * `index` - Next free parameter namespace index
/// * `sort` - Direction of an earlier sort stage, if any
///
/// # Returns
///
/// The fragment and the next free index after this stage
fn emit(stage: &Stage, index: ParamIndex, sort: Option<SortDirection>) -> (Fragment, ParamIndex) {
    match stage {
        Stage::MatchArticles => (Fragment::text("MATCH (n:Article)"), index),
        Stage::TextIds(ids) => (membership(index, "ids", "n.article_id", json!(ids)), index.next()),
        Stage::General(GeneralFilter::Ids(filter)) => (
            membership(index, "ids", "n.article_id", json!(filter.ids)),
            index.next(),
        ),
        Stage::General(GeneralFilter::Titles(filter)) => (
            membership(index, "titles", "n.title", json!(filter.titles)),
            index.next(),
        ),
        Stage::General(GeneralFilter::Categories(filter)) => {
            let param = index.name("categories");
            let fragment = Fragment {
                text: format!(
                    "WITH n WHERE any(category IN n.categories WHERE category IN ${})",
                    param
                ),
                parameters: vec![(param, json!(filter.categories))],
            };
            (fragment, index.next())
        }
        Stage::Distance(filter) => (distance(index, filter), index.next()),
        Stage::LinksCount(filter) => (links_count(index, filter), index.next()),
        Stage::SortBy(sort) => (Fragment::text(sort_key(sort.by)), index),
        Stage::Return(return_type) => (Fragment::text(projection(*return_type, sort)), index),
        Stage::Skip(count) => {
            let param = index.name("skip");
            let fragment = Fragment {
                text: format!("SKIP ${}", param),
                parameters: vec![(param, json!(count))],
            };
            (fragment, index.next())
        }
        Stage::Limit(count) => {
            let param = index.name("limit");
            let fragment = Fragment {
                text: format!("LIMIT ${}", param),
                parameters: vec![(param, json!(count))],
            };
            (fragment, index.next())
        }
    }
}

fn membership(index: ParamIndex, base: &str, property: &str, values: Value) -> Fragment {
    let param = index.name(base);
    Fragment {
        text: format!("WITH n WHERE {} IN ${}", property, param),
        parameters: vec![(param, values)],
    }
}

fn distance(index: ParamIndex, filter: &DistanceFilter) -> Fragment {
    let candidates = index.name("candidates");
    let source = index.name("source");
    let source_title = index.name("source_title");
    let dist = index.name("dist");
    let procedure = match filter.strategy {
        DistanceStrategy::AtDist => "athop",
        DistanceStrategy::UpToDist => "tohop",
    };

    Fragment {
        text: format!(
            "WITH collect(n) AS {candidates}\n\
             MATCH ({source}:Article {{title: ${source_title}}})\n\
             CALL apoc.neighbors.{procedure}({source}, 'Link>', ${dist}) YIELD node\n\
             WITH node, {candidates} WHERE node IN {candidates}\n\
             WITH node AS n"
        ),
        parameters: vec![
            (source_title, json!(filter.source_title)),
            (dist, json!(filter.dist)),
        ],
    }
}

fn links_count(index: ParamIndex, filter: &LinksCountFilter) -> Fragment {
    let count = index.name("link_count");
    let min = index.name("min_links");
    let mut parameters = vec![(min.clone(), json!(filter.min))];

    let category_clause = match &filter.categories {
        Some(categories) => {
            let param = index.name("link_categories");
            let clause = format!(
                "\n    WHERE all(category IN ${} WHERE category IN m.categories)",
                param
            );
            parameters.push((param, json!(categories)));
            clause
        }
        None => String::new(),
    };

    let max_clause = match filter.max {
        Some(max) => {
            let param = index.name("max_links");
            let clause = format!(" AND {} <= ${}", count, param);
            parameters.push((param, json!(max)));
            clause
        }
        None => String::new(),
    };

    Fragment {
        text: format!(
            "CALL {{\n    WITH n\n    OPTIONAL MATCH (n)-[link:Link]->(m:Article){category_clause}\n    RETURN count(link) AS {count}\n}}\n\
             WITH n, {count} WHERE {count} >= ${min}{max_clause}\n\
             WITH n"
        ),
        parameters,
    }
}

fn sort_key(by: SortBy) -> String {
    match by {
        SortBy::Id => "WITH n, n.article_id AS sort_key".to_string(),
        SortBy::Title => "WITH n, n.title AS sort_key".to_string(),
        SortBy::LinkCount => "CALL {\n    WITH n\n    OPTIONAL MATCH (n)-[link:Link]->(:Article)\n    RETURN count(link) AS sort_key\n}".to_string(),
    }
}

fn projection(return_type: ReturnType, sort: Option<SortDirection>) -> String {
    let order = sort
        .map(|dir| format!("\nORDER BY sort_key {}", dir.keyword()))
        .unwrap_or_default();

    match return_type {
        ReturnType::Count => "RETURN count(n) AS count".to_string(),
        ReturnType::Id => format!("RETURN n.article_id AS id{}", order),
        ReturnType::Title => format!("RETURN n.title AS title{}", order),
        ReturnType::Node | ReturnType::NodeWithContent => {
            let carried = if sort.is_some() { ", sort_key" } else { "" };
            format!(
                "OPTIONAL MATCH (n)-[:Link]->(linked:Article)\n\
                 WITH n, collect(linked {{.article_id, .title}}) AS links{carried}\n\
                 RETURN n {{.article_id, .title, .categories, links: links}} AS node{order}"
            )
        }
    }
}
