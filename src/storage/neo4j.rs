//! Neo4j graph store
//!
//! Talks to the Neo4j HTTP transactional endpoint
//! (`POST {url}/db/{database}/tx/commit`). Every call is one auto-committed
//! transaction. `includeStats` exposes the created-node and
//! created-relationship counters the write contract needs.

use crate::config::GraphConfig;
use crate::query::CompiledQuery;
use crate::storage::traits::{GraphStore, Row, StorageError, StorageResult, UpsertOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const CONSTRAINTS: [&str; 2] = [
    "CREATE CONSTRAINT article_id_unique IF NOT EXISTS FOR (a:Article) REQUIRE a.article_id IS UNIQUE",
    "CREATE CONSTRAINT article_title_unique IF NOT EXISTS FOR (a:Article) REQUIRE a.title IS UNIQUE",
];

const UPSERT_ARTICLE: &str = "MERGE (a:Article {article_id: $id})\n\
     ON CREATE SET a.title = $title, a.categories = $categories";

const UPSERT_AND_LINK_ARTICLE: &str = "MATCH (s:Article {article_id: $source_id})\n\
     MERGE (d:Article {article_id: $dest_id})\n\
     ON CREATE SET d.title = $dest_title, d.categories = $dest_categories\n\
     MERGE (s)-[:Link]->(d)";

const LINK_BY_TITLE: &str = "MATCH (s:Article {article_id: $source_id})\n\
     MATCH (d:Article {title: $dest_title})\n\
     MERGE (s)-[:Link]->(d)";

const TRUNCATE: &str = "MATCH (n) DETACH DELETE n";

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default)]
    nodes_created: u64,
    #[serde(default)]
    relationships_created: u64,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
    #[serde(default)]
    stats: Stats,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

/// Graph store backed by a Neo4j server with APOC installed
pub struct Neo4jGraphStore {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, String)>,
}

impl Neo4jGraphStore {
    /// Creates a store for the configured server and database
    ///
    /// # Arguments
    ///
    /// * `config` - Graph store configuration
    /// * `timeout` - Timeout applied to each HTTP request
    pub fn new(config: &GraphConfig, timeout: Duration) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Http {
                url: config.url.clone(),
                source: e,
            })?;

        let credentials = match (&config.user, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            credentials,
        })
    }

    /// Creates the uniqueness constraints on article id and title
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        for constraint in CONSTRAINTS {
            self.run(constraint, json!({})).await?;
        }
        Ok(())
    }

    async fn run(&self, statement: &str, parameters: Value) -> StorageResult<TxResult> {
        let body = json!({
            "statements": [{
                "statement": statement,
                "parameters": parameters,
                "includeStats": true,
            }]
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| StorageError::Http {
            url: self.endpoint.clone(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: TxResponse = response.json().await.map_err(|e| StorageError::Http {
            url: self.endpoint.clone(),
            source: e,
        })?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(StorageError::Query {
                code: error.code,
                message: error.message,
            });
        }

        body.results.into_iter().next().ok_or_else(|| {
            StorageError::Serialization("transaction response carried no result".to_string())
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_article(
        &self,
        id: i64,
        title: &str,
        categories: &[String],
    ) -> StorageResult<bool> {
        let result = self
            .run(
                UPSERT_ARTICLE,
                json!({"id": id, "title": title, "categories": categories}),
            )
            .await?;
        Ok(result.stats.nodes_created > 0)
    }

    async fn upsert_and_link_article(
        &self,
        source_id: i64,
        dest_id: i64,
        dest_title: &str,
        dest_categories: &[String],
    ) -> StorageResult<UpsertOutcome> {
        let result = self
            .run(
                UPSERT_AND_LINK_ARTICLE,
                json!({
                    "source_id": source_id,
                    "dest_id": dest_id,
                    "dest_title": dest_title,
                    "dest_categories": dest_categories,
                }),
            )
            .await?;

        Ok(UpsertOutcome {
            node_created: result.stats.nodes_created > 0,
            relationship_created: result.stats.relationships_created > 0,
        })
    }

    async fn link_by_title(&self, source_id: i64, dest_title: &str) -> StorageResult<()> {
        let result = self
            .run(
                LINK_BY_TITLE,
                json!({"source_id": source_id, "dest_title": dest_title}),
            )
            .await?;

        if result.stats.relationships_created == 0 {
            return Err(StorageError::RelationshipNotCreated {
                source_id,
                dest_title: dest_title.to_string(),
            });
        }
        Ok(())
    }

    async fn execute(&self, query: &CompiledQuery) -> StorageResult<Vec<Row>> {
        let parameters = serde_json::to_value(query.parameters())?;
        let result = self.run(query.text(), parameters).await?;

        let columns = result.columns;
        Ok(result
            .data
            .into_iter()
            .map(|data| columns.iter().cloned().zip(data.row).collect())
            .collect())
    }

    async fn truncate(&self) -> StorageResult<()> {
        self.run(TRUNCATE, json!({})).await?;
        Ok(())
    }
}
