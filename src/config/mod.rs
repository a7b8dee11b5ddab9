//! Configuration module for Wiki-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use wiki_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("wiki-ripple.toml")).unwrap();
//! println!("Worker pool size: {}", config.import.max_concurrent_requests);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, GraphBackend, GraphConfig, ImportConfig, TextConfig, WikiConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
