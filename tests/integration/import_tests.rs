//! Integration tests for the importer
//!
//! These tests use wiremock to stand in for the MediaWiki Action API and run
//! the full import cycle into the in-memory graph store and an in-memory text
//! index, then query the result back.

use serde_json::{json, Value};
use std::sync::Arc;
use wiki_ripple::config::{ImportConfig, WikiConfig};
use wiki_ripple::query::{
    ArticleQuery, DistanceFilter, DistanceStrategy, GraphFilter, ReturnType, SearchResponse,
    Sort, SortBy, SortDirection, TextField, TextSearchFilter,
};
use wiki_ripple::storage::{MemoryGraphStore, SqliteTextIndex};
use wiki_ripple::wiki::MediaWikiClient;
use wiki_ripple::{ImportRequest, Importer, QueryEngine, RippleError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_wiki_config(server: &MockServer) -> WikiConfig {
    WikiConfig {
        api_url: format!("{}/w/api.php", server.uri()),
        user_agent: "TestBot/1.0 (test@example.com)".to_string(),
        request_timeout_secs: 5,
        max_retries: 1,
        retry_delay_ms: 10,
    }
}

fn create_import_config() -> ImportConfig {
    ImportConfig {
        max_concurrent_requests: 4,
        category_batch_size: 49,
        run_deadline_secs: 30,
    }
}

async fn mount_json(server: &MockServer, matchers: &[(&str, &str)], body: Value) {
    let mut mock = Mock::given(method("GET")).and(path("/w/api.php"));
    for (key, value) in matchers {
        mock = mock.and(query_param(*key, *value));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts the three requests one page resolution makes
async fn mount_page(
    server: &MockServer,
    id: i64,
    title: &str,
    extract: &str,
    categories: &[&str],
    links: &[&str],
) {
    let page_id = id.to_string();
    mount_json(
        server,
        &[("titles", title), ("prop", "extracts|pageprops")],
        json!({"query": {"pages": [
            {"pageid": id, "ns": 0, "title": title, "extract": extract}
        ]}}),
    )
    .await;

    let categories: Vec<Value> = categories
        .iter()
        .map(|c| json!({"ns": 14, "title": format!("Category:{}", c)}))
        .collect();
    mount_json(
        server,
        &[("pageids", page_id.as_str()), ("prop", "categories")],
        json!({"query": {"pages": [{"pageid": id, "title": title, "categories": categories}]}}),
    )
    .await;

    let links: Vec<Value> = links
        .iter()
        .map(|l| json!({"ns": 0, "title": l}))
        .collect();
    mount_json(
        server,
        &[("pageids", page_id.as_str()), ("prop", "links")],
        json!({"query": {"pages": [{"pageid": id, "title": title, "links": links}]}}),
    )
    .await;
}

/// Alpha links to Beta, Gamma and Delta; Beta links back to Alpha, to Gamma
/// and to Zeta. Delta lacks the required category.
async fn mount_small_wiki(server: &MockServer) {
    mount_page(
        server,
        1,
        "Alpha",
        "Alpha sails the open ocean.",
        &["Ships"],
        &["Beta", "Gamma", "Delta"],
    )
    .await;
    mount_page(
        server,
        2,
        "Beta",
        "Beta crossed the ocean twice.",
        &["Ships"],
        &["Alpha", "Gamma", "Zeta"],
    )
    .await;
    mount_page(server, 3, "Gamma", "Gamma stayed in port.", &["Ships"], &[]).await;

    mount_json(
        server,
        &[("titles", "Beta|Gamma|Delta"), ("clcategories", "Category:Ships")],
        json!({"query": {"pages": [
            {"pageid": 2, "ns": 0, "title": "Beta", "categories": [{"ns": 14, "title": "Category:Ships"}]},
            {"pageid": 3, "ns": 0, "title": "Gamma", "categories": [{"ns": 14, "title": "Category:Ships"}]},
            {"pageid": 4, "ns": 0, "title": "Delta"}
        ]}}),
    )
    .await;
}

struct Harness {
    importer: Importer,
    engine: QueryEngine,
    graph: Arc<MemoryGraphStore>,
    text: Arc<SqliteTextIndex>,
}

fn create_harness(server: &MockServer) -> Harness {
    let source = Arc::new(MediaWikiClient::new(&create_wiki_config(server)).unwrap());
    let graph = Arc::new(MemoryGraphStore::new());
    let text = Arc::new(SqliteTextIndex::in_memory().unwrap());

    Harness {
        importer: Importer::new(source, graph.clone(), text.clone(), create_import_config()),
        engine: QueryEngine::new(graph.clone(), text.clone()),
        graph,
        text,
    }
}

#[tokio::test]
async fn test_import_radius_one() {
    let server = MockServer::start().await;
    mount_small_wiki(&server).await;
    let harness = create_harness(&server);

    let request = ImportRequest::new("Alpha", 1, ["Ships"], "en");
    let summary = harness.importer.import(&request).await.unwrap();

    assert_eq!(summary.total_nodes, 3);
    assert_eq!(summary.total_relationships, 4);
    // Delta (wrong category) and Zeta (beyond the radius)
    assert_eq!(summary.invalid_links, 2);
    assert!(summary.finished_at >= summary.started_at);

    assert_eq!(harness.graph.node_count().unwrap(), 3);
    assert_eq!(harness.graph.relationship_count().unwrap(), 4);
    assert!(!harness.graph.contains_title("Delta").unwrap());

    let mut from_alpha = harness.graph.links_of("Alpha").unwrap();
    from_alpha.sort();
    assert_eq!(from_alpha, vec!["Beta", "Gamma"]);

    let mut from_beta = harness.graph.links_of("Beta").unwrap();
    from_beta.sort();
    assert_eq!(from_beta, vec!["Alpha", "Gamma"]);

    assert_eq!(harness.text.document_count().unwrap(), 3);
    assert_eq!(
        harness.text.categories_of(2).unwrap(),
        Some(vec!["Ships".to_string()])
    );
}

#[tokio::test]
async fn test_import_then_federated_query() {
    let server = MockServer::start().await;
    mount_small_wiki(&server).await;
    let harness = create_harness(&server);

    harness
        .importer
        .import(&ImportRequest::new("Alpha", 1, ["Ships"], "en"))
        .await
        .unwrap();

    let mut query = ArticleQuery::new(ReturnType::Title);
    query.text_filters.push(TextSearchFilter {
        field: TextField::Content,
        fuzzy: false,
        bool_op: Default::default(),
        matches: "ocean".to_string(),
    });
    query.sort = Some(Sort {
        by: SortBy::Title,
        dir: SortDirection::Desc,
    });

    let response = harness.engine.process(&query).await.unwrap();
    assert_eq!(
        response,
        SearchResponse::Titles {
            titles: vec!["Beta".to_string(), "Alpha".to_string()]
        }
    );

    let mut reachable = ArticleQuery::new(ReturnType::NodeWithContent);
    reachable
        .graph_filters
        .push(GraphFilter::Distance(DistanceFilter {
            source_title: "Beta".to_string(),
            dist: 1,
            strategy: DistanceStrategy::AtDist,
        }));
    reachable.sort = Some(Sort {
        by: SortBy::Id,
        dir: SortDirection::Asc,
    });

    let SearchResponse::Nodes { nodes } = harness.engine.process(&reachable).await.unwrap() else {
        panic!("expected nodes");
    };
    let titles: Vec<&str> = nodes.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Gamma"]);
    assert_eq!(nodes[0].content.as_deref(), Some("Alpha sails the open ocean."));
    assert_eq!(nodes[1].content.as_deref(), Some("Gamma stayed in port."));
    assert_eq!(nodes[0].links.len(), 2);
}

#[tokio::test]
async fn test_rerun_replaces_previous_import() {
    let server = MockServer::start().await;
    mount_small_wiki(&server).await;
    let harness = create_harness(&server);
    let request = ImportRequest::new("Alpha", 1, ["Ships"], "en");

    let first = harness.importer.import(&request).await.unwrap();
    let second = harness.importer.import(&request).await.unwrap();

    assert_eq!(first.total_nodes, second.total_nodes);
    assert_eq!(first.total_relationships, second.total_relationships);
    assert_eq!(harness.graph.node_count().unwrap(), 3);
    assert_eq!(harness.graph.relationship_count().unwrap(), 4);
    assert_eq!(harness.text.document_count().unwrap(), 3);
}

#[tokio::test]
async fn test_missing_root_fails_without_writes() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        &[("titles", "Nowhere")],
        json!({"query": {"pages": [{"ns": 0, "title": "Nowhere", "missing": true}]}}),
    )
    .await;
    let harness = create_harness(&server);

    let result = harness
        .importer
        .import(&ImportRequest::new("Nowhere", 1, ["Ships"], "en"))
        .await;

    assert!(matches!(result, Err(RippleError::Source(_))));
    assert_eq!(harness.graph.node_count().unwrap(), 0);
    assert_eq!(harness.text.document_count().unwrap(), 0);
}

#[tokio::test]
async fn test_persistent_api_failure_aborts_import() {
    let server = MockServer::start().await;
    mount_page(&server, 1, "Alpha", "Alpha.", &["Ships"], &["Beta"]).await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("clcategories", "Category:Ships"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let harness = create_harness(&server);

    let result = harness
        .importer
        .import(&ImportRequest::new("Alpha", 1, ["Ships"], "en"))
        .await;

    assert!(matches!(result, Err(RippleError::Source(_))));
}
