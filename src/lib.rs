//! Wiki-Ripple: bounded encyclopedia neighborhood importer
//!
//! This crate walks the link graph of a wiki outward from one root article,
//! ring by ring, keeping only articles that carry one of a set of categories.
//! Admitted articles land in a graph store (nodes and `Link` edges) and in a
//! full-text index. The query side compiles typed filter requests into a single
//! graph program, optionally federated with a prior text-index lookup.

pub mod config;
pub mod crawler;
pub mod query;
pub mod state;
pub mod storage;
pub mod wiki;

use thiserror::Error;

/// Main error type for Wiki-Ripple operations
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Document source error: {0}")]
    Source(#[from] wiki::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid query shape: {0}")]
    InvalidQueryShape(#[from] query::QueryShapeError),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Import exceeded its deadline of {seconds}s")]
    DeadlineExceeded { seconds: u64 },

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Wiki-Ripple operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ImportRequest, ImportSummary, Importer};
pub use query::{ArticleQuery, QueryEngine, SearchResponse};
pub use state::{Distance, ImportNode, TraversalState};
