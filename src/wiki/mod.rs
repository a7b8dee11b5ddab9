//! Document-link source
//!
//! This module defines what the importer needs from an encyclopedia:
//! - full page resolution (id, canonical title, plain-text content, categories, links)
//! - batched category-membership checks over up to 49 titles
//!
//! [`MediaWikiClient`] implements the contract against the MediaWiki Action API.

mod client;

pub use client::{build_http_client, MediaWikiClient};

use async_trait::async_trait;
use thiserror::Error;

/// Maximum titles in one category-membership request
pub const MAX_TITLES_PER_CATEGORY_REQUEST: usize = 49;

/// Maximum categories an import may filter on
pub const MAX_FILTER_CATEGORIES: usize = 49;

/// A fully resolved article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
    /// External page id
    pub id: i64,

    /// Canonical title (after redirects and normalization)
    pub title: String,

    /// Plain-text content
    pub content: String,

    /// Category names without namespace prefix
    pub categories: Vec<String>,

    /// Main-namespace link titles, in API order
    pub links: Vec<String>,
}

/// Category-membership answer for one requested title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMembership {
    /// Title as reported by the source (normalized, redirects followed)
    pub title: String,

    /// External id; `None` for missing or malformed titles
    pub page_id: Option<i64>,

    /// Whether the page carries at least one of the requested categories
    pub in_category: bool,
}

/// Errors from the document source
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Page not found: {title}")]
    NotFound { title: String },

    #[error("Page is a disambiguation page: {title}")]
    Disambiguation { title: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("Malformed API response: {0}")]
    Malformed(String),

    #[error("Too many titles in one request: {count} (max {max})")]
    TooManyTitles { count: usize, max: usize },
}

impl FetchError {
    /// True for failures that only exclude one title ("not found", "disambiguation")
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Disambiguation { .. })
    }

    /// True for failures worth retrying (timeouts, connection errors, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The title a lookup failure refers to
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::NotFound { title } | Self::Disambiguation { title } => Some(title),
            _ => None,
        }
    }
}

/// Result type for document source operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Contract consumed by the importer
#[async_trait]
pub trait DocumentSource: Send + Sync + 'static {
    /// Resolves one title to its full page
    ///
    /// Fails with [`FetchError::NotFound`] or [`FetchError::Disambiguation`]
    /// when the title cannot become an article node.
    async fn fetch_page(&self, lang: &str, title: &str) -> FetchResult<WikiPage>;

    /// Reports, per title, whether it carries any of `categories`
    ///
    /// `titles` holds at most [`MAX_TITLES_PER_CATEGORY_REQUEST`] entries.
    async fn filter_by_category(
        &self,
        lang: &str,
        titles: &[String],
        categories: &[String],
    ) -> FetchResult<Vec<CategoryMembership>>;
}
