use serde::Deserialize;

/// Main configuration structure for Wiki-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub wiki: WikiConfig,
    #[serde(default)]
    pub import: ImportConfig,
    pub graph: GraphConfig,
    pub text: TextConfig,
}

/// Document source (MediaWiki Action API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikiConfig {
    /// API endpoint; `{lang}` is replaced with the import language
    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    /// Identifying User-Agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Timeout applied to each HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (timeouts, 5xx, 429)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retries (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl WikiConfig {
    /// Returns the API endpoint for a given language edition
    pub fn api_url_for(&self, lang: &str) -> String {
        self.api_url.replace("{lang}", lang)
    }
}

/// Import pipeline behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Worker pool bound for one frontier node's fan-out
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: usize,

    /// Titles per category-membership request
    #[serde(rename = "category-batch-size", default = "default_batch_size")]
    pub category_batch_size: usize,

    /// Deadline for a whole import run (seconds, 0 disables)
    #[serde(rename = "run-deadline-secs", default = "default_run_deadline")]
    pub run_deadline_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_concurrency(),
            category_batch_size: default_batch_size(),
            run_deadline_secs: default_run_deadline(),
        }
    }
}

/// Which graph store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,
    Memory,
}

/// Graph store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_backend")]
    pub backend: GraphBackend,

    /// Base URL of the Neo4j HTTP endpoint
    #[serde(default = "default_graph_url")]
    pub url: String,

    #[serde(default = "default_database")]
    pub database: String,

    pub user: Option<String>,
    pub password: Option<String>,
}

/// Text index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TextConfig {
    /// Path to the SQLite full-text database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_api_url() -> String {
    "https://{lang}.wikipedia.org/w/api.php".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

fn default_concurrency() -> usize {
    16
}

fn default_batch_size() -> usize {
    crate::wiki::MAX_TITLES_PER_CATEGORY_REQUEST
}

fn default_run_deadline() -> u64 {
    3600
}

fn default_backend() -> GraphBackend {
    GraphBackend::Neo4j
}

fn default_graph_url() -> String {
    "http://localhost:7474".to_string()
}

fn default_database() -> String {
    "neo4j".to_string()
}
