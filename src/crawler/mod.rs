//! Import pipeline
//!
//! This module contains the breadth-first import, including:
//! - link classification by category membership
//! - page resolution with atomic claims on the traversal state
//! - the FIFO frontier and per-node worker pool
//! - overall import coordination

mod classifier;
mod coordinator;
mod resolver;
mod scheduler;

pub use classifier::{Classification, LinkClassifier};
pub use coordinator::Importer;
pub use resolver::{PageResolver, Resolution};
pub use scheduler::{Frontier, QueuedNode, WorkerPool};

use crate::wiki::MAX_FILTER_CATEGORIES;
use crate::{Result, RippleError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parameters of one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Title of the article the walk starts from
    pub root_title: String,

    /// Maximum distance from the root, at least 1
    pub radius: u32,

    /// An article is admitted when it carries any of these
    pub categories: BTreeSet<String>,

    /// Wiki language edition, e.g. "en"
    pub lang: String,
}

impl ImportRequest {
    pub fn new(
        root_title: impl Into<String>,
        radius: u32,
        categories: impl IntoIterator<Item = impl Into<String>>,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            root_title: root_title.into(),
            radius,
            categories: categories.into_iter().map(Into::into).collect(),
            lang: lang.into(),
        }
    }

    /// Rejects malformed requests before any I/O
    pub fn validate(&self) -> Result<()> {
        if self.root_title.trim().is_empty() {
            return Err(RippleError::InvalidArgument(
                "root title must not be empty".to_string(),
            ));
        }

        if self.radius == 0 {
            return Err(RippleError::InvalidArgument(
                "radius must be at least 1".to_string(),
            ));
        }

        if self.categories.is_empty() {
            return Err(RippleError::InvalidArgument(
                "at least one category is required".to_string(),
            ));
        }

        if self.categories.len() > MAX_FILTER_CATEGORIES {
            return Err(RippleError::InvalidArgument(format!(
                "too many categories: {} (max {})",
                self.categories.len(),
                MAX_FILTER_CATEGORIES
            )));
        }

        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(RippleError::InvalidArgument(
                "category names must not be empty".to_string(),
            ));
        }

        let lang_ok = !self.lang.is_empty()
            && self
                .lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !lang_ok {
            return Err(RippleError::InvalidArgument(format!(
                "invalid language code: '{}'",
                self.lang
            )));
        }

        Ok(())
    }
}

/// Totals reported by a finished import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Article nodes written, root included
    pub total_nodes: u64,

    /// `Link` relationships created
    pub total_relationships: u64,

    /// Titles recorded as `INVALID`
    pub invalid_links: u64,

    /// Resolutions that lost the claim to an earlier one
    pub duplicates_suppressed: u64,

    pub seconds_elapsed: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
