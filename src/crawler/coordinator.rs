//! Import coordinator - breadth-first import orchestration
//!
//! This module contains the main import loop, which:
//! - resolves the root and resets both stores
//! - expands frontier nodes one at a time, strictly FIFO
//! - fans each node's unknown links out to a bounded worker pool
//!   (classification batches, then page resolutions, in completion order)
//! - writes admitted articles to the graph store and the text index
//! - reports totals once the frontier is empty

use crate::config::ImportConfig;
use crate::crawler::classifier::{Classification, LinkClassifier};
use crate::crawler::resolver::{PageResolver, Resolution};
use crate::crawler::scheduler::{Frontier, QueuedNode, WorkerPool};
use crate::crawler::{ImportRequest, ImportSummary};
use crate::state::{Distance, ImportNode, TraversalState};
use crate::storage::{GraphStore, TextIndex};
use crate::wiki::{DocumentSource, FetchResult, WikiPage};
use crate::{Result, RippleError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Work item completed by the fan-out pool
enum FanOutEvent {
    Classified(FetchResult<Classification>),
    Resolved(FetchResult<Resolution>),
}

/// Per-run collaborators shared by every fan-out
struct RunContext {
    state: Arc<TraversalState>,
    classifier: LinkClassifier,
    resolver: PageResolver,
    radius: u32,
}

#[derive(Debug, Default)]
struct RunTotals {
    relationships: u64,
    duplicates: u64,
}

/// Breadth-first importer writing to a graph store and a text index
pub struct Importer {
    source: Arc<dyn DocumentSource>,
    graph: Arc<dyn GraphStore>,
    text: Arc<dyn TextIndex>,
    settings: ImportConfig,

    /// Held for a whole run; one import writes to the stores at a time
    session: Mutex<()>,
}

impl Importer {
    /// Creates a new importer
    ///
    /// # Arguments
    ///
    /// * `source` - The document-link source
    /// * `graph` - Graph store receiving article nodes and links
    /// * `text` - Text index receiving article content
    /// * `settings` - Concurrency, batching and deadline settings
    pub fn new(
        source: Arc<dyn DocumentSource>,
        graph: Arc<dyn GraphStore>,
        text: Arc<dyn TextIndex>,
        settings: ImportConfig,
    ) -> Self {
        Self {
            source,
            graph,
            text,
            settings,
            session: Mutex::new(()),
        }
    }

    /// Runs one import with a fresh traversal state
    ///
    /// Both stores are truncated once the root resolves, so re-running the
    /// same request reproduces the same graph.
    ///
    /// # Returns
    ///
    /// * `Ok(ImportSummary)` - Import finished
    /// * `Err(RippleError)` - Invalid request, store failure, unrecoverable
    ///   source failure or deadline exceeded
    pub async fn import(&self, request: &ImportRequest) -> Result<ImportSummary> {
        self.import_with_state(request, Arc::new(TraversalState::new()))
            .await
    }

    /// Runs one import, recording distances in `state`
    ///
    /// `state` should be empty; titles already present are treated as known.
    pub async fn import_with_state(
        &self,
        request: &ImportRequest,
        state: Arc<TraversalState>,
    ) -> Result<ImportSummary> {
        request.validate()?;

        let _session = self.session.lock().await;
        let started_at = Utc::now();
        let clock = Instant::now();

        let run = self.run(request, Arc::clone(&state));
        let outcome = match self.settings.run_deadline_secs {
            0 => run.await,
            seconds => tokio::time::timeout(Duration::from_secs(seconds), run)
                .await
                .unwrap_or_else(|_| Err(RippleError::DeadlineExceeded { seconds })),
        };

        let totals = match outcome {
            Ok(totals) => totals,
            Err(e) => {
                tracing::error!("Import of '{}' aborted: {}", request.root_title, e);
                return Err(e);
            }
        };

        let summary = ImportSummary {
            total_nodes: state.admitted_count() as u64,
            total_relationships: totals.relationships,
            invalid_links: state.invalid_count() as u64,
            duplicates_suppressed: totals.duplicates,
            seconds_elapsed: clock.elapsed().as_secs_f64(),
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Import of '{}' complete: {} nodes, {} relationships, {} invalid links in {:.1}s",
            request.root_title,
            summary.total_nodes,
            summary.total_relationships,
            summary.invalid_links,
            summary.seconds_elapsed
        );

        Ok(summary)
    }

    async fn run(&self, request: &ImportRequest, state: Arc<TraversalState>) -> Result<RunTotals> {
        let categories: Vec<String> = request.categories.iter().cloned().collect();

        let root = self
            .source
            .fetch_page(&request.lang, &request.root_title)
            .await?;

        tracing::info!(
            "Importing from '{}' (radius {}, {} categories, lang {})",
            root.title,
            request.radius,
            categories.len(),
            request.lang
        );

        self.graph.truncate().await?;
        self.text.truncate().await?;

        self.graph
            .upsert_article(root.id, &root.title, &root.categories)
            .await?;
        self.index(&root).await?;
        state.try_insert(&root.title, Distance::Hops(0));

        let context = RunContext {
            classifier: LinkClassifier::new(
                Arc::clone(&self.source),
                &request.lang,
                &categories,
                self.settings.category_batch_size,
            ),
            resolver: PageResolver::new(Arc::clone(&self.source), &request.lang, Arc::clone(&state)),
            state,
            radius: request.radius,
        };

        let mut frontier = Frontier::new();
        frontier.push(ImportNode::from_page(&root), 0);

        let mut totals = RunTotals::default();
        let mut ring = None;
        let mut ring_size = 0;
        let mut ring_index = 0;

        while let Some(QueuedNode { node, distance }) = frontier.pop() {
            if ring != Some(distance) {
                ring = Some(distance);
                ring_size = frontier.count_at(distance) + 1;
                ring_index = 0;
            }
            ring_index += 1;

            tracing::info!(
                "Ring {}: expanding '{}' ({}/{}), {} nodes so far",
                distance,
                node.title,
                ring_index,
                ring_size,
                context.state.admitted_count()
            );

            self.expand(&node, distance, &context, &mut frontier, &mut totals)
                .await?;
        }

        Ok(totals)
    }

    /// Processes every out-link of one frontier node
    ///
    /// Returns once all tasks of the fan-out have completed and every admitted
    /// neighbor is written and enqueued.
    async fn expand(
        &self,
        node: &ImportNode,
        distance: u32,
        context: &RunContext,
        frontier: &mut Frontier,
        totals: &mut RunTotals,
    ) -> Result<()> {
        let state = &context.state;
        let mut linked: HashSet<String> = HashSet::new();
        let mut unknown = Vec::new();

        for link in &node.out_links {
            if link == &node.title {
                continue;
            }

            match state.get(link) {
                Some(Distance::Hops(_)) => {
                    if linked.insert(link.clone()) {
                        self.graph.link_by_title(node.id, link).await?;
                        totals.relationships += 1;
                    }
                }
                Some(Distance::Invalid) => {}
                None if distance >= context.radius => {
                    tracing::debug!("'{}' is beyond radius {}", link, context.radius);
                    state.mark_invalid(link);
                }
                None => unknown.push(link.clone()),
            }
        }

        if unknown.is_empty() {
            return Ok(());
        }

        let mut pool = WorkerPool::new(self.settings.max_concurrent_requests);
        for batch in context.classifier.batches(&unknown) {
            let classifier = context.classifier.clone();
            let batch = batch.to_vec();
            pool.spawn(async move { FanOutEvent::Classified(classifier.classify_batch(batch).await) });
        }

        let mut in_flight: HashSet<String> = HashSet::new();
        let mut deferred: Vec<String> = Vec::new();

        while let Some(event) = pool.next_completed().await {
            match event? {
                FanOutEvent::Classified(result) => {
                    let classification = result?;

                    for title in &classification.invalid {
                        tracing::debug!("'{}' lacks every required category", title);
                        state.mark_invalid(title);
                    }

                    for title in classification.resolvable {
                        match state.get(&title) {
                            // Known under its canonical title; link once the fan-out has drained
                            Some(Distance::Hops(_)) => deferred.push(title),
                            Some(Distance::Invalid) => {}
                            None => {
                                if in_flight.insert(title.clone()) {
                                    let resolver = context.resolver.clone();
                                    let next = distance + 1;
                                    pool.spawn(async move {
                                        FanOutEvent::Resolved(resolver.resolve(title, next).await)
                                    });
                                }
                            }
                        }
                    }
                }
                FanOutEvent::Resolved(result) => match result? {
                    Resolution::Claimed(page) => {
                        self.link_neighbor(node, &page, totals).await?;
                        self.index(&page).await?;
                        linked.insert(page.title.clone());
                        frontier.push(ImportNode::from_page(&page), distance + 1);
                    }
                    Resolution::Duplicate(page) => {
                        totals.duplicates += 1;
                        tracing::debug!("'{}' was already claimed", page.title);

                        let admitted = matches!(state.get(&page.title), Some(Distance::Hops(_)));
                        if admitted && page.title != node.title && linked.insert(page.title.clone())
                        {
                            self.link_neighbor(node, &page, totals).await?;
                        }
                    }
                    Resolution::Invalid { .. } => {}
                },
            }
        }

        for title in deferred {
            if title != node.title && linked.insert(title.clone()) {
                self.graph.link_by_title(node.id, &title).await?;
                totals.relationships += 1;
            }
        }

        Ok(())
    }

    /// Ensures `page` exists and is linked from `node`
    async fn link_neighbor(
        &self,
        node: &ImportNode,
        page: &WikiPage,
        totals: &mut RunTotals,
    ) -> Result<()> {
        let outcome = self
            .graph
            .upsert_and_link_article(node.id, page.id, &page.title, &page.categories)
            .await?;

        if outcome.relationship_created {
            totals.relationships += 1;
        } else {
            tracing::warn!(
                "Link '{}' -> '{}' was not created; it already exists",
                node.title,
                page.title
            );
        }
        Ok(())
    }

    async fn index(&self, page: &WikiPage) -> Result<()> {
        self.text
            .index_document(page.id, &page.title, &page.content, &page.categories)
            .await?;
        Ok(())
    }
}
