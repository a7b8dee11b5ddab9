//! Link classification
//!
//! Splits candidate link titles into those that cannot become article nodes
//! and those worth a full page fetch, using batched category-membership
//! requests against the document source.

use crate::wiki::{CategoryMembership, DocumentSource, FetchResult, MAX_TITLES_PER_CATEGORY_REQUEST};
use std::sync::Arc;

/// Outcome of classifying a set of link titles
///
/// Titles are the source's normalized titles (redirects followed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Missing, malformed or outside every required category
    pub invalid: Vec<String>,

    /// In at least one required category with a real page id
    pub resolvable: Vec<String>,
}

impl Classification {
    /// Partitions raw membership answers
    pub fn from_memberships(memberships: Vec<CategoryMembership>) -> Self {
        let mut classification = Self::default();
        for membership in memberships {
            let well_formed = matches!(membership.page_id, Some(id) if id != 0);
            if membership.in_category && well_formed {
                classification.resolvable.push(membership.title);
            } else {
                classification.invalid.push(membership.title);
            }
        }
        classification
    }
}

/// Category filter bound to one import's language and categories
#[derive(Clone)]
pub struct LinkClassifier {
    source: Arc<dyn DocumentSource>,
    lang: Arc<str>,
    categories: Arc<[String]>,
    batch_size: usize,
}

impl LinkClassifier {
    /// Creates a classifier
    ///
    /// `batch_size` is clamped to `1..=MAX_TITLES_PER_CATEGORY_REQUEST`.
    pub fn new(
        source: Arc<dyn DocumentSource>,
        lang: &str,
        categories: &[String],
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            lang: Arc::from(lang),
            categories: Arc::from(categories),
            batch_size: batch_size.clamp(1, MAX_TITLES_PER_CATEGORY_REQUEST),
        }
    }

    /// Splits `titles` into request-sized batches
    pub fn batches<'a>(&self, titles: &'a [String]) -> impl Iterator<Item = &'a [String]> {
        titles.chunks(self.batch_size)
    }

    /// Classifies one batch with a single source request
    pub async fn classify_batch(&self, batch: Vec<String>) -> FetchResult<Classification> {
        let memberships = self
            .source
            .filter_by_category(&self.lang, &batch, &self.categories)
            .await?;
        Ok(Classification::from_memberships(memberships))
    }
}
