//! MediaWiki Action API client
//!
//! This module handles all HTTP requests to the document source, including:
//! - Building HTTP clients with an identifying user agent and timeouts
//! - Page resolution (content, disambiguation check, categories, links)
//! - Batched category-membership queries
//! - `continue` token pagination
//! - Retry with a fixed delay for transient failures

use crate::config::WikiConfig;
use crate::wiki::{
    CategoryMembership, DocumentSource, FetchError, FetchResult, WikiPage,
    MAX_TITLES_PER_CATEGORY_REQUEST,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The document source configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &WikiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the MediaWiki Action API of any language edition
#[derive(Debug, Clone)]
pub struct MediaWikiClient {
    client: Client,
    api_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl MediaWikiClient {
    pub fn new(config: &WikiConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            api_url: config.api_url.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    fn endpoint(&self, lang: &str) -> String {
        self.api_url.replace("{lang}", lang)
    }

    /// Sends one API request, retrying transient failures
    async fn get_json(&self, lang: &str, params: &[(String, String)]) -> FetchResult<Value> {
        let url = self.endpoint(lang);
        let mut attempt = 0;

        loop {
            match self.send_once(&url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Transient error from {} (retry {}/{}): {}",
                        url,
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, params: &[(String, String)]) -> FetchResult<Value> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        if let Some(error) = body.get("error") {
            return Err(FetchError::Api {
                code: str_field(error, "code").unwrap_or("unknown").to_string(),
                info: str_field(error, "info").unwrap_or_default().to_string(),
            });
        }

        Ok(body)
    }

    /// Runs a query to completion, handing every `query` object to `each`
    async fn query_continued<F>(
        &self,
        lang: &str,
        params: Vec<(String, String)>,
        mut each: F,
    ) -> FetchResult<()>
    where
        F: FnMut(&Value) -> FetchResult<()> + Send,
    {
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut request = params.clone();
            request.extend(continuation.iter().cloned());

            let body = self.get_json(lang, &request).await?;
            if let Some(query) = body.get("query") {
                each(query)?;
            }

            match body.get("continue").and_then(Value::as_object) {
                Some(tokens) => {
                    continuation = tokens
                        .iter()
                        .map(|(key, value)| (key.clone(), param_value(value)))
                        .collect();
                }
                None => return Ok(()),
            }
        }
    }

    /// Collects the item titles of a list property (`categories`, `links`) of one page
    async fn list_prop(
        &self,
        lang: &str,
        page_id: i64,
        prop: &str,
        extra: &[(&str, &str)],
    ) -> FetchResult<Vec<String>> {
        let mut params = query_params();
        params.push(param("pageids", page_id.to_string()));
        params.push(param("prop", prop));
        params.extend(extra.iter().map(|(k, v)| param(k, *v)));

        let mut titles = Vec::new();
        self.query_continued(lang, params, |query| {
            for page in pages(query) {
                let items = page.get(prop).and_then(Value::as_array);
                for item in items.into_iter().flatten() {
                    if let Some(title) = str_field(item, "title") {
                        titles.push(title.to_string());
                    }
                }
            }
            Ok(())
        })
        .await?;

        Ok(titles)
    }
}

#[async_trait]
impl DocumentSource for MediaWikiClient {
    async fn fetch_page(&self, lang: &str, title: &str) -> FetchResult<WikiPage> {
        let mut params = query_params();
        params.push(param("titles", title));
        params.push(param("prop", "extracts|pageprops"));
        params.push(param("explaintext", "1"));
        params.push(param("ppprop", "disambiguation"));

        let body = self.get_json(lang, &params).await?;
        let page = body
            .get("query")
            .map(pages)
            .and_then(|mut pages| pages.next())
            .ok_or_else(|| FetchError::Malformed(format!("no page entry for '{}'", title)))?;

        let resolved = str_field(page, "title").unwrap_or(title).to_string();

        if is_missing(page) {
            return Err(FetchError::NotFound {
                title: title.to_string(),
            });
        }

        if page.pointer("/pageprops/disambiguation").is_some() {
            return Err(FetchError::Disambiguation { title: resolved });
        }

        let id = page_id(page).ok_or_else(|| FetchError::NotFound {
            title: title.to_string(),
        })?;
        let content = str_field(page, "extract").unwrap_or_default().to_string();

        let categories = self
            .list_prop(lang, id, "categories", &[("cllimit", "max"), ("clshow", "!hidden")])
            .await?
            .iter()
            .map(|c| strip_namespace(c))
            .collect();

        let links = self
            .list_prop(lang, id, "links", &[("pllimit", "max"), ("plnamespace", "0")])
            .await?;

        tracing::trace!("Resolved '{}' as '{}' ({} links)", title, resolved, links.len());

        Ok(WikiPage {
            id,
            title: resolved,
            content,
            categories,
            links,
        })
    }

    async fn filter_by_category(
        &self,
        lang: &str,
        titles: &[String],
        categories: &[String],
    ) -> FetchResult<Vec<CategoryMembership>> {
        if titles.len() > MAX_TITLES_PER_CATEGORY_REQUEST {
            return Err(FetchError::TooManyTitles {
                count: titles.len(),
                max: MAX_TITLES_PER_CATEGORY_REQUEST,
            });
        }
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<String> = categories.iter().map(|c| category_title(c)).collect();

        let mut params = query_params();
        params.push(param("titles", titles.join("|")));
        params.push(param("prop", "categories"));
        params.push(param("cllimit", "max"));
        params.push(param("clshow", "!hidden"));
        params.push(param("clcategories", wanted.join("|")));

        let mut order: Vec<String> = Vec::new();
        let mut by_title: HashMap<String, CategoryMembership> = HashMap::new();

        self.query_continued(lang, params, |query| {
            for page in pages(query) {
                let Some(title) = str_field(page, "title") else {
                    continue;
                };
                let in_category = page
                    .get("categories")
                    .and_then(Value::as_array)
                    .map_or(false, |found| !found.is_empty());
                let page_id = if is_missing(page) { None } else { page_id(page) };

                let entry = by_title.entry(title.to_string()).or_insert_with(|| {
                    order.push(title.to_string());
                    CategoryMembership {
                        title: title.to_string(),
                        page_id,
                        in_category: false,
                    }
                });
                entry.in_category |= in_category;
            }
            Ok(())
        })
        .await?;

        Ok(order
            .into_iter()
            .filter_map(|title| by_title.remove(&title))
            .collect())
    }
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

fn query_params() -> Vec<(String, String)> {
    vec![
        param("action", "query"),
        param("format", "json"),
        param("formatversion", "2"),
        param("redirects", "1"),
    ]
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pages(query: &Value) -> impl Iterator<Item = &Value> {
    query
        .get("pages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn is_missing(page: &Value) -> bool {
    page.get("missing").is_some() || page.get("invalid").is_some()
}

fn page_id(page: &Value) -> Option<i64> {
    page.get("pageid")
        .and_then(Value::as_i64)
        .filter(|id| *id != 0)
}

/// "Category:Films" -> "Films" (localized prefixes included)
fn strip_namespace(title: &str) -> String {
    title
        .split_once(':')
        .map(|(_, name)| name)
        .unwrap_or(title)
        .to_string()
}

/// "Films" -> "Category:Films"; already-prefixed names pass through
fn category_title(name: &str) -> String {
    if name.starts_with("Category:") {
        name.to_string()
    } else {
        format!("Category:{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(server: &MockServer) -> WikiConfig {
        WikiConfig {
            api_url: format!("{}/w/api.php", server.uri()),
            user_agent: "TestBot/1.0 (test@example.com)".to_string(),
            request_timeout_secs: 5,
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    async fn mount_json(server: &MockServer, matchers: Vec<(&str, &str)>, body: Value) {
        let mut mock = Mock::given(method("GET")).and(path("/w/api.php"));
        for (key, value) in matchers {
            mock = mock.and(query_param(key, value));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("Category:Films"), "Films");
        assert_eq!(strip_namespace("Categoría:Películas"), "Películas");
        assert_eq!(strip_namespace("Plain"), "Plain");
    }

    #[test]
    fn test_category_title() {
        assert_eq!(category_title("Films"), "Category:Films");
        assert_eq!(category_title("Category:Films"), "Category:Films");
    }

    #[tokio::test]
    async fn test_fetch_page_follows_continuation() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            vec![("titles", "Titanic"), ("prop", "extracts|pageprops")],
            json!({"query": {"pages": [
                {"pageid": 52371, "ns": 0, "title": "Titanic (1997 film)", "extract": "A film."}
            ]}}),
        )
        .await;

        mount_json(
            &server,
            vec![("pageids", "52371"), ("prop", "categories"), ("clshow", "!hidden")],
            json!({"query": {"pages": [{"pageid": 52371, "title": "Titanic (1997 film)",
                "categories": [{"ns": 14, "title": "Category:English-language films"}]}]}}),
        )
        .await;

        // Second links page, mounted first so it wins for the continued request
        mount_json(
            &server,
            vec![("pageids", "52371"), ("prop", "links"), ("plcontinue", "52371|0|Kate")],
            json!({"query": {"pages": [{"pageid": 52371, "title": "Titanic (1997 film)",
                "links": [{"ns": 0, "title": "Kate Winslet"}]}]}}),
        )
        .await;

        mount_json(
            &server,
            vec![("pageids", "52371"), ("prop", "links")],
            json!({
                "continue": {"plcontinue": "52371|0|Kate", "continue": "||"},
                "query": {"pages": [{"pageid": 52371, "title": "Titanic (1997 film)",
                    "links": [{"ns": 0, "title": "James Cameron"}]}]}
            }),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let page = client.fetch_page("en", "Titanic").await.unwrap();

        assert_eq!(page.id, 52371);
        assert_eq!(page.title, "Titanic (1997 film)");
        assert_eq!(page.content, "A film.");
        assert_eq!(page.categories, vec!["English-language films"]);
        assert_eq!(page.links, vec!["James Cameron", "Kate Winslet"]);
    }

    #[tokio::test]
    async fn test_fetch_page_not_found() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            vec![("titles", "Nowhere")],
            json!({"query": {"pages": [{"ns": 0, "title": "Nowhere", "missing": true}]}}),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let err = client.fetch_page("en", "Nowhere").await.unwrap_err();

        assert!(matches!(err, FetchError::NotFound { ref title } if title == "Nowhere"));
    }

    #[tokio::test]
    async fn test_fetch_page_disambiguation() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            vec![("titles", "Mercury")],
            json!({"query": {"pages": [{"pageid": 19, "ns": 0, "title": "Mercury",
                "pageprops": {"disambiguation": ""}}]}}),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let err = client.fetch_page("en", "Mercury").await.unwrap_err();

        assert!(err.is_lookup_failure());
        assert_eq!(err.title(), Some("Mercury"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            vec![],
            json!({"error": {"code": "badvalue", "info": "Unrecognized value"}}),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let err = client.fetch_page("en", "Anything").await.unwrap_err();

        assert!(matches!(err, FetchError::Api { ref code, .. } if code == "badvalue"));
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        mount_json(
            &server,
            vec![("prop", "categories")],
            json!({"query": {"pages": [{"pageid": 2, "ns": 0, "title": "B",
                "categories": [{"ns": 14, "title": "Category:X"}]}]}}),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let result = client
            .filter_by_category("en", &["B".to_string()], &["X".to_string()])
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result[0].in_category);
    }

    #[tokio::test]
    async fn test_persistent_status_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let err = client.fetch_page("en", "A").await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_filter_by_category_partitions_titles() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            vec![
                ("titles", "B|C|Gone"),
                ("clshow", "!hidden"),
                ("clcategories", "Category:X|Category:Y"),
            ],
            json!({"query": {"pages": [
                {"pageid": 2, "ns": 0, "title": "B", "categories": [{"ns": 14, "title": "Category:X"}]},
                {"pageid": 3, "ns": 0, "title": "C"},
                {"ns": 0, "title": "Gone", "missing": true}
            ]}}),
        )
        .await;

        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();
        let titles = vec!["B".to_string(), "C".to_string(), "Gone".to_string()];
        let result = client
            .filter_by_category("en", &titles, &["X".to_string(), "Category:Y".to_string()])
            .await
            .unwrap();

        assert_eq!(
            result,
            vec![
                CategoryMembership {
                    title: "B".to_string(),
                    page_id: Some(2),
                    in_category: true
                },
                CategoryMembership {
                    title: "C".to_string(),
                    page_id: Some(3),
                    in_category: false
                },
                CategoryMembership {
                    title: "Gone".to_string(),
                    page_id: None,
                    in_category: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_by_category_rejects_oversized_batch() {
        let server = MockServer::start().await;
        let client = MediaWikiClient::new(&create_test_config(&server)).unwrap();

        let titles: Vec<String> = (0..50).map(|i| format!("T{}", i)).collect();
        let err = client
            .filter_by_category("en", &titles, &["X".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooManyTitles { count: 50, max: 49 }));
    }

    #[test]
    fn test_build_http_client() {
        let config = WikiConfig {
            api_url: "https://{lang}.wikipedia.org/w/api.php".to_string(),
            user_agent: "TestBot/1.0".to_string(),
            request_timeout_secs: 30,
            max_retries: 0,
            retry_delay_ms: 0,
        };
        assert!(build_http_client(&config).is_ok());
    }
}
