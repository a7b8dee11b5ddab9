use crate::config::types::{Config, GraphBackend, GraphConfig, ImportConfig, TextConfig, WikiConfig};
use crate::wiki::MAX_TITLES_PER_CATEGORY_REQUEST;
use crate::ConfigError;
use url::Url;

/// Upper bound for the per-node worker pool
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_wiki_config(&config.wiki)?;
    validate_import_config(&config.import)?;
    validate_graph_config(&config.graph)?;
    validate_text_config(&config.text)?;
    Ok(())
}

/// Validates document source configuration
fn validate_wiki_config(config: &WikiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_url_for("en"))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates import pipeline configuration
fn validate_import_config(config: &ImportConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > MAX_CONCURRENT_REQUESTS
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and {}, got {}",
            MAX_CONCURRENT_REQUESTS, config.max_concurrent_requests
        )));
    }

    if config.category_batch_size < 1 || config.category_batch_size > MAX_TITLES_PER_CATEGORY_REQUEST
    {
        return Err(ConfigError::Validation(format!(
            "category-batch-size must be between 1 and {}, got {}",
            MAX_TITLES_PER_CATEGORY_REQUEST, config.category_batch_size
        )));
    }

    Ok(())
}

/// Validates graph store configuration
fn validate_graph_config(config: &GraphConfig) -> Result<(), ConfigError> {
    if config.backend == GraphBackend::Neo4j {
        Url::parse(&config.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid graph url: {}", e)))?;

        if config.database.is_empty() {
            return Err(ConfigError::Validation(
                "graph database cannot be empty".to_string(),
            ));
        }
    }

    if config.user.is_some() != config.password.is_some() {
        return Err(ConfigError::Validation(
            "graph user and password must be set together".to_string(),
        ));
    }

    Ok(())
}

/// Validates text index configuration
fn validate_text_config(config: &TextConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "text database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
