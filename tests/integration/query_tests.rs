//! Integration tests for the federated query engine
//!
//! Fixtures are written straight into the in-memory graph store and an
//! in-memory SQLite text index, then queried through [`QueryEngine`].

use std::sync::Arc;
use wiki_ripple::query::{
    ArticleQuery, BoolOp, CategoriesFilter, DistanceFilter, DistanceStrategy, GeneralFilter,
    GraphFilter, LinksCountFilter, ReturnType, SearchResponse, Sort, SortBy, SortDirection, TextField, TextSearchFilter,
    TitlesFilter,
};
use wiki_ripple::storage::{GraphStore, MemoryGraphStore, SqliteTextIndex, TextIndex};
use wiki_ripple::{QueryEngine, RippleError};

struct Fixture {
    graph: Arc<MemoryGraphStore>,
    text: Arc<SqliteTextIndex>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            graph: Arc::new(MemoryGraphStore::new()),
            text: Arc::new(SqliteTextIndex::in_memory().unwrap()),
        }
    }

    async fn article(&self, id: i64, title: &str, categories: &[&str], content: &str) {
        let categories: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
        self.graph
            .upsert_article(id, title, &categories)
            .await
            .unwrap();
        self.text
            .index_document(id, title, content, &categories)
            .await
            .unwrap();
    }

    async fn link(&self, source_id: i64, dest_title: &str) {
        self.graph.link_by_title(source_id, dest_title).await.unwrap();
    }

    fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.graph.clone(), self.text.clone())
    }
}

fn content_filter(matches: &str) -> TextSearchFilter {
    TextSearchFilter {
        field: TextField::Content,
        fuzzy: false,
        bool_op: BoolOp::And,
        matches: matches.to_string(),
    }
}

fn categories(names: &[&str]) -> GeneralFilter {
    GeneralFilter::Categories(CategoriesFilter {
        categories: names.iter().map(|c| c.to_string()).collect(),
    })
}

/// Fifteen articles in category X, written in scrambled id order
async fn fifteen_x_articles() -> Fixture {
    let fixture = Fixture::new();
    for id in [9, 3, 15, 1, 12, 7, 5, 14, 2, 11, 6, 13, 4, 10, 8] {
        let content = if id % 2 == 0 {
            "an even article about harbors"
        } else {
            "an odd article about lighthouses"
        };
        fixture
            .article(id, &format!("Article {:02}", id), &["X"], content)
            .await;
    }
    fixture.article(99, "Outsider", &["W"], "harbors").await;
    fixture
}

/// `Hub` links to two Y articles and five Z articles
async fn hub_with_mixed_links() -> Fixture {
    let fixture = Fixture::new();
    fixture.article(100, "Hub", &["X"], "central hub").await;

    for (id, title) in [(201, "Y one"), (202, "Y two")] {
        fixture.article(id, title, &["Y"], "y article").await;
        fixture.link(100, title).await;
    }
    for id in 301..=305 {
        let title = format!("Z {}", id);
        fixture.article(id, &title, &["Z"], "z article").await;
        fixture.link(100, &title).await;
    }
    fixture.link(201, "Y two").await;
    fixture
}

#[tokio::test]
async fn test_sorted_limit_returns_smallest_ids() {
    let fixture = fifteen_x_articles().await;

    let mut query = ArticleQuery::new(ReturnType::Id);
    query.general_filters.push(categories(&["X"]));
    query.sort = Some(Sort {
        by: SortBy::Id,
        dir: SortDirection::Asc,
    });
    query.limit = Some(10);

    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(
        response,
        SearchResponse::Ids {
            ids: (1..=10).collect()
        }
    );
}

#[tokio::test]
async fn test_skip_and_descending_titles() {
    let fixture = fifteen_x_articles().await;

    let mut query = ArticleQuery::new(ReturnType::Title);
    query.general_filters.push(categories(&["X"]));
    query.sort = Some(Sort {
        by: SortBy::Title,
        dir: SortDirection::Desc,
    });
    query.skip = 2;
    query.limit = Some(3);

    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(
        response,
        SearchResponse::Titles {
            titles: vec![
                "Article 13".to_string(),
                "Article 12".to_string(),
                "Article 11".to_string()
            ]
        }
    );
}

#[tokio::test]
async fn test_text_filter_intersects_general_filter() {
    let fixture = fifteen_x_articles().await;

    let mut query = ArticleQuery::new(ReturnType::Count);
    query.text_filters.push(content_filter("harbors"));
    query.general_filters.push(categories(&["X"]));

    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(response, SearchResponse::Count { count: 7 });
}

#[tokio::test]
async fn test_text_filter_without_matches_returns_nothing() {
    let fixture = fifteen_x_articles().await;

    let mut query = ArticleQuery::new(ReturnType::Id);
    query.text_filters.push(content_filter("submarine"));

    let response = fixture.engine().process(&query).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_links_count_restricted_to_category() {
    let fixture = hub_with_mixed_links().await;

    let mut query = ArticleQuery::new(ReturnType::Id);
    query
        .graph_filters
        .push(GraphFilter::LinksCount(LinksCountFilter {
            min: 1,
            max: Some(3),
            categories: Some(vec!["Y".to_string()]),
        }));
    query.sort = Some(Sort {
        by: SortBy::Id,
        dir: SortDirection::Asc,
    });

    // Hub has two Y links among seven; "Y one" has its single link to "Y two"
    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(response, SearchResponse::Ids { ids: vec![100, 201] });

    let mut unrestricted = ArticleQuery::new(ReturnType::Id);
    unrestricted
        .graph_filters
        .push(GraphFilter::LinksCount(LinksCountFilter {
            min: 1,
            max: Some(3),
            categories: None,
        }));
    unrestricted.sort = Some(Sort {
        by: SortBy::Id,
        dir: SortDirection::Asc,
    });

    // Hub has seven links in total; only "Y one" stays within bounds
    let response = fixture.engine().process(&unrestricted).await.unwrap();
    assert_eq!(response, SearchResponse::Ids { ids: vec![201] });
}

fn within(source_title: &str, dist: u32) -> GraphFilter {
    GraphFilter::Distance(DistanceFilter {
        source_title: source_title.to_string(),
        dist,
        strategy: DistanceStrategy::UpToDist,
    })
}

#[tokio::test]
async fn test_text_search_within_radius() {
    let fixture = hub_with_mixed_links().await;

    let mut query = ArticleQuery::new(ReturnType::Id);
    query.text_filters.push(content_filter("article"));
    query.graph_filters.push(within("Y one", 1));

    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(response, SearchResponse::Ids { ids: vec![202] });

    // The source itself is never part of its own neighbourhood
    let mut query = ArticleQuery::new(ReturnType::Id);
    query.text_filters.push(content_filter("central"));
    query.graph_filters.push(within("Hub", 2));

    let response = fixture.engine().process(&query).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_sort_by_link_count() {
    let fixture = hub_with_mixed_links().await;

    let mut query = ArticleQuery::new(ReturnType::Title);
    query.sort = Some(Sort {
        by: SortBy::LinkCount,
        dir: SortDirection::Desc,
    });
    query.limit = Some(2);

    let response = fixture.engine().process(&query).await.unwrap();
    assert_eq!(
        response,
        SearchResponse::Titles {
            titles: vec!["Hub".to_string(), "Y one".to_string()]
        }
    );
}

#[tokio::test]
async fn test_node_with_content_backfills_text() {
    let fixture = hub_with_mixed_links().await;

    let mut query = ArticleQuery::new(ReturnType::NodeWithContent);
    query.general_filters.push(GeneralFilter::Titles(TitlesFilter {
        titles: vec!["Hub".to_string()],
    }));

    let SearchResponse::Nodes { nodes } = fixture.engine().process(&query).await.unwrap() else {
        panic!("expected nodes");
    };

    assert_eq!(nodes.len(), 1);
    let hub = &nodes[0];
    assert_eq!(hub.id, 100);
    assert_eq!(hub.content.as_deref(), Some("central hub"));
    assert!(hub.categories.contains("X"));
    assert_eq!(hub.links.len(), 7);
    assert_eq!(hub.links[0].title, "Y one");
}

#[tokio::test]
async fn test_plain_node_has_no_content() {
    let fixture = hub_with_mixed_links().await;

    let mut query = ArticleQuery::new(ReturnType::Node);
    query.general_filters.push(categories(&["Y"]));
    query.sort = Some(Sort {
        by: SortBy::Id,
        dir: SortDirection::Asc,
    });

    let SearchResponse::Nodes { nodes } = fixture.engine().process(&query).await.unwrap() else {
        panic!("expected nodes");
    };

    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|n| n.content.is_none()));
    assert_eq!(nodes[0].links.len(), 1);
    assert!(nodes[1].links.is_empty());
}

#[tokio::test]
async fn test_blank_text_filter_is_rejected() {
    let fixture = Fixture::new();

    let mut query = ArticleQuery::new(ReturnType::Id);
    query.text_filters.push(content_filter("   "));

    let result = fixture.engine().process(&query).await;
    assert!(matches!(result, Err(RippleError::InvalidArgument(_))));
}
