//! In-memory graph store
//!
//! Implements the full write contract with the same idempotence and failure
//! semantics as the Neo4j store, and evaluates compiled queries directly from
//! their stage plan. Used for tests and for runs that need no database.

use crate::query::{
    CompiledQuery, DistanceStrategy, GeneralFilter, IdsFilter, LinksCountFilter, ReturnType,
    Sort, SortBy, SortDirection, Stage,
};
use crate::storage::traits::{GraphStore, Row, StorageError, StorageResult, UpsertOutcome};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredArticle {
    title: String,
    categories: Vec<String>,
    /// Outbound link targets in creation order
    links: Vec<i64>,
}

#[derive(Debug, Default)]
struct Graph {
    articles: BTreeMap<i64, StoredArticle>,
    titles: HashMap<String, i64>,
}

impl Graph {
    fn insert(&mut self, id: i64, title: &str, categories: &[String]) -> StorageResult<bool> {
        if self.articles.contains_key(&id) {
            return Ok(false);
        }
        if self.titles.contains_key(title) {
            return Err(StorageError::Query {
                code: "Neo.ClientError.Schema.ConstraintValidationFailed".to_string(),
                message: format!("Article with title '{}' already exists", title),
            });
        }

        self.titles.insert(title.to_string(), id);
        self.articles.insert(
            id,
            StoredArticle {
                title: title.to_string(),
                categories: categories.to_vec(),
                links: Vec::new(),
            },
        );
        Ok(true)
    }

    /// Adds `source -> dest` unless present; false when nothing changed
    fn link(&mut self, source: i64, dest: i64) -> bool {
        match self.articles.get_mut(&source) {
            Some(article) if !article.links.contains(&dest) => {
                article.links.push(dest);
                true
            }
            _ => false,
        }
    }

    fn relationship_count(&self) -> usize {
        self.articles.values().map(|a| a.links.len()).sum()
    }

    /// Nodes reachable from `source_title`, excluding the source itself
    fn reachable(&self, source_title: &str, dist: u32, strategy: DistanceStrategy) -> HashSet<i64> {
        let Some(&source) = self.titles.get(source_title) else {
            return HashSet::new();
        };

        let mut depth = HashMap::from([(source, 0u32)]);
        let mut queue = VecDeque::from([source]);

        while let Some(id) = queue.pop_front() {
            let d = depth[&id];
            if d == dist {
                continue;
            }
            for next in self.articles.get(&id).map(|a| a.links.as_slice()).unwrap_or(&[]) {
                if !depth.contains_key(next) {
                    depth.insert(*next, d + 1);
                    queue.push_back(*next);
                }
            }
        }

        depth
            .into_iter()
            .filter(|(_, d)| match strategy {
                DistanceStrategy::AtDist => *d == dist && *d > 0,
                DistanceStrategy::UpToDist => *d >= 1,
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Outbound links to nodes carrying every category in `categories`
    fn link_count(&self, id: i64, categories: Option<&[String]>) -> u64 {
        let Some(article) = self.articles.get(&id) else {
            return 0;
        };

        article
            .links
            .iter()
            .filter_map(|target| self.articles.get(target))
            .filter(|target| match categories {
                Some(required) => required.iter().all(|c| target.categories.contains(c)),
                None => true,
            })
            .count() as u64
    }

    fn within_link_bounds(&self, id: i64, filter: &LinksCountFilter) -> bool {
        let count = self.link_count(id, filter.categories.as_deref());
        count >= u64::from(filter.min) && filter.max.map_or(true, |max| count <= u64::from(max))
    }

    fn sort(&self, candidates: &mut [i64], sort: Sort) {
        match sort.by {
            SortBy::Id => candidates.sort(),
            SortBy::Title => candidates.sort_by(|a, b| self.articles[a].title.cmp(&self.articles[b].title)),
            SortBy::LinkCount => candidates.sort_by_key(|id| self.link_count(*id, None)),
        }
        if sort.dir == SortDirection::Desc {
            candidates.reverse();
        }
    }

    fn project(&self, id: i64, return_type: ReturnType) -> Row {
        let article = &self.articles[&id];
        let mut row = Row::new();

        match return_type {
            ReturnType::Id => {
                row.insert("id".to_string(), json!(id));
            }
            ReturnType::Title => {
                row.insert("title".to_string(), json!(article.title));
            }
            ReturnType::Node | ReturnType::NodeWithContent | ReturnType::Count => {
                let links: Vec<Value> = article
                    .links
                    .iter()
                    .filter_map(|target| {
                        self.articles.get(target).map(|t| {
                            json!({"article_id": target, "title": t.title})
                        })
                    })
                    .collect();
                row.insert(
                    "node".to_string(),
                    json!({
                        "article_id": id,
                        "title": article.title,
                        "categories": article.categories,
                        "links": links,
                    }),
                );
            }
        }
        row
    }

    fn evaluate(&self, plan: &[Stage]) -> StorageResult<Vec<Row>> {
        let mut candidates: Vec<i64> = Vec::new();
        let mut sort = None;
        let mut projection = None;
        let mut skip = 0usize;
        let mut limit = None;

        for stage in plan {
            match stage {
                Stage::MatchArticles => candidates = self.articles.keys().copied().collect(),
                Stage::TextIds(ids) | Stage::General(GeneralFilter::Ids(IdsFilter { ids })) => {
                    candidates.retain(|id| ids.contains(id))
                }
                Stage::General(GeneralFilter::Titles(filter)) => {
                    candidates.retain(|id| filter.titles.contains(&self.articles[id].title))
                }
                Stage::General(GeneralFilter::Categories(filter)) => candidates.retain(|id| {
                    self.articles[id]
                        .categories
                        .iter()
                        .any(|c| filter.categories.contains(c))
                }),
                Stage::Distance(filter) => {
                    let reached = self.reachable(&filter.source_title, filter.dist, filter.strategy);
                    candidates.retain(|id| reached.contains(id));
                }
                Stage::LinksCount(filter) => {
                    candidates.retain(|id| self.within_link_bounds(*id, filter))
                }
                Stage::SortBy(s) => sort = Some(*s),
                Stage::Return(return_type) => projection = Some(*return_type),
                Stage::Skip(count) => skip = *count as usize,
                Stage::Limit(count) => limit = Some(*count as usize),
            }
        }

        let projection = projection.ok_or_else(|| {
            StorageError::Unsupported("query plan has no projection".to_string())
        })?;

        let rows: Vec<Row> = if projection == ReturnType::Count {
            let mut row = Row::new();
            row.insert("count".to_string(), json!(candidates.len()));
            vec![row]
        } else {
            if let Some(sort) = sort {
                self.sort(&mut candidates, sort);
            }
            candidates
                .into_iter()
                .map(|id| self.project(id, projection))
                .collect()
        };

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}

/// Graph store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: Mutex<Graph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> StorageResult<usize> {
        Ok(self.graph()?.articles.len())
    }

    pub fn relationship_count(&self) -> StorageResult<usize> {
        Ok(self.graph()?.relationship_count())
    }

    /// Titles `title` links to, in creation order
    pub fn links_of(&self, title: &str) -> StorageResult<Vec<String>> {
        let graph = self.graph()?;
        let links = graph
            .titles
            .get(title)
            .and_then(|id| graph.articles.get(id))
            .map(|article| {
                article
                    .links
                    .iter()
                    .filter_map(|target| graph.articles.get(target))
                    .map(|target| target.title.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(links)
    }

    pub fn contains_title(&self, title: &str) -> StorageResult<bool> {
        Ok(self.graph()?.titles.contains_key(title))
    }

    fn graph(&self) -> StorageResult<MutexGuard<'_, Graph>> {
        self.graph
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_article(
        &self,
        id: i64,
        title: &str,
        categories: &[String],
    ) -> StorageResult<bool> {
        self.graph()?.insert(id, title, categories)
    }

    async fn upsert_and_link_article(
        &self,
        source_id: i64,
        dest_id: i64,
        dest_title: &str,
        dest_categories: &[String],
    ) -> StorageResult<UpsertOutcome> {
        let mut graph = self.graph()?;
        if !graph.articles.contains_key(&source_id) {
            return Ok(UpsertOutcome::default());
        }

        let node_created = graph.insert(dest_id, dest_title, dest_categories)?;
        let relationship_created = graph.link(source_id, dest_id);

        Ok(UpsertOutcome {
            node_created,
            relationship_created,
        })
    }

    async fn link_by_title(&self, source_id: i64, dest_title: &str) -> StorageResult<()> {
        let mut graph = self.graph()?;
        let dest = graph.titles.get(dest_title).copied();

        match dest {
            Some(dest) if graph.link(source_id, dest) => Ok(()),
            _ => Err(StorageError::RelationshipNotCreated {
                source_id,
                dest_title: dest_title.to_string(),
            }),
        }
    }

    async fn execute(&self, query: &CompiledQuery) -> StorageResult<Vec<Row>> {
        self.graph()?.evaluate(query.plan())
    }

    async fn truncate(&self) -> StorageResult<()> {
        let mut graph = self.graph()?;
        graph.articles.clear();
        graph.titles.clear();
        Ok(())
    }
}
