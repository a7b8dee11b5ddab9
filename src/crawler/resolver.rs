//! Page resolution
//!
//! Fetches one classified title and claims its canonical title in the
//! traversal state. The claim is an atomic insert-if-absent, so when two
//! sibling links resolve to the same page only one task wins it.

use crate::state::{Distance, TraversalState};
use crate::wiki::{DocumentSource, FetchError, FetchResult, WikiPage};
use std::sync::Arc;
use tracing::warn;

/// What happened to one resolved title
#[derive(Debug)]
pub enum Resolution {
    /// This task recorded the page's distance; the caller must write it
    Claimed(WikiPage),

    /// The canonical title already had an entry
    Duplicate(WikiPage),

    /// Lookup failure; the requested title is now `INVALID`
    Invalid { title: String, reason: FetchError },
}

/// Page fetcher bound to one import's language and traversal state
#[derive(Clone)]
pub struct PageResolver {
    source: Arc<dyn DocumentSource>,
    lang: Arc<str>,
    state: Arc<TraversalState>,
}

impl PageResolver {
    pub fn new(source: Arc<dyn DocumentSource>, lang: &str, state: Arc<TraversalState>) -> Self {
        Self {
            source,
            lang: Arc::from(lang),
            state,
        }
    }

    /// Fetches `title` and claims it at `distance`
    ///
    /// # Returns
    ///
    /// * `Ok(Resolution)` - The page, or the lookup failure that excluded it
    /// * `Err(FetchError)` - A transport or API failure that retries did not cure
    pub async fn resolve(&self, title: String, distance: u32) -> FetchResult<Resolution> {
        match self.source.fetch_page(&self.lang, &title).await {
            Ok(page) => {
                if self.state.try_insert(&page.title, Distance::Hops(distance)) {
                    Ok(Resolution::Claimed(page))
                } else {
                    Ok(Resolution::Duplicate(page))
                }
            }
            Err(reason) if reason.is_lookup_failure() => {
                warn!("Excluding '{}': {}", title, reason);
                self.state.mark_invalid(&title);
                Ok(Resolution::Invalid { title, reason })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::CategoryMembership;
    use async_trait::async_trait;

    struct OnePageSource;

    #[async_trait]
    impl DocumentSource for OnePageSource {
        async fn fetch_page(&self, _lang: &str, title: &str) -> FetchResult<WikiPage> {
            match title {
                "Titanic" | "RMS Titanic" => Ok(WikiPage {
                    id: 1,
                    title: "Titanic".to_string(),
                    content: "A ship.".to_string(),
                    categories: vec!["Ships".to_string()],
                    links: Vec::new(),
                }),
                "Mercury" => Err(FetchError::Disambiguation {
                    title: "Mercury".to_string(),
                }),
                "Broken" => Err(FetchError::Status {
                    url: "https://en.wikipedia.org/w/api.php".to_string(),
                    status: 502,
                }),
                other => Err(FetchError::NotFound {
                    title: other.to_string(),
                }),
            }
        }

        async fn filter_by_category(
            &self,
            _lang: &str,
            _titles: &[String],
            _categories: &[String],
        ) -> FetchResult<Vec<CategoryMembership>> {
            Ok(Vec::new())
        }
    }

    fn resolver() -> (PageResolver, Arc<TraversalState>) {
        let state = Arc::new(TraversalState::new());
        (
            PageResolver::new(Arc::new(OnePageSource), "en", Arc::clone(&state)),
            state,
        )
    }

    #[tokio::test]
    async fn test_first_resolution_claims_second_is_duplicate() {
        let (resolver, state) = resolver();

        let first = resolver.resolve("Titanic".to_string(), 1).await.unwrap();
        let second = resolver.resolve("RMS Titanic".to_string(), 1).await.unwrap();

        assert!(matches!(first, Resolution::Claimed(_)));
        assert!(matches!(second, Resolution::Duplicate(ref page) if page.title == "Titanic"));
        assert_eq!(state.get("Titanic"), Some(Distance::Hops(1)));
        assert!(!state.contains("RMS Titanic"));
    }

    #[tokio::test]
    async fn test_lookup_failures_mark_invalid() {
        let (resolver, state) = resolver();

        let disambiguation = resolver.resolve("Mercury".to_string(), 2).await.unwrap();
        let missing = resolver.resolve("Nowhere".to_string(), 2).await.unwrap();

        assert!(matches!(disambiguation, Resolution::Invalid { .. }));
        assert!(matches!(missing, Resolution::Invalid { .. }));
        assert_eq!(state.get("Mercury"), Some(Distance::Invalid));
        assert_eq!(state.get("Nowhere"), Some(Distance::Invalid));
    }

    #[tokio::test]
    async fn test_transport_failures_propagate() {
        let (resolver, state) = resolver();

        let result = resolver.resolve("Broken".to_string(), 1).await;

        assert!(matches!(result, Err(FetchError::Status { status: 502, .. })));
        assert!(!state.contains("Broken"));
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_claim_once() {
        let (resolver, _state) = resolver();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve("Titanic".to_string(), 1).await })
            })
            .collect();

        let mut claimed = 0;
        for task in tasks {
            if let Resolution::Claimed(_) = task.await.unwrap().unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }
}
