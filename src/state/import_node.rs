use crate::wiki::WikiPage;
use std::collections::HashSet;

/// A resolved article waiting in the frontier for link expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNode {
    /// External (wiki page) id
    pub id: i64,

    pub title: String,

    /// Outbound link titles, first occurrence order, without duplicates
    pub out_links: Vec<String>,
}

impl ImportNode {
    pub fn new(id: i64, title: impl Into<String>, links: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let out_links = links
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();

        Self {
            id,
            title: title.into(),
            out_links,
        }
    }

    pub fn from_page(page: &WikiPage) -> Self {
        Self::new(page.id, page.title.clone(), page.links.iter().cloned())
    }
}
