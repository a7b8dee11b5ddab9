//! Import scheduling
//!
//! This module provides:
//! - the FIFO frontier of resolved articles awaiting link expansion
//! - a bounded worker pool scoped to one frontier node's fan-out

use crate::state::ImportNode;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// An article in the frontier with its distance from the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNode {
    pub node: ImportNode,
    pub distance: u32,
}

/// Strict FIFO queue of articles awaiting expansion
///
/// Nodes are enqueued only after their distance is fixed, so dequeued
/// distances never decrease.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueuedNode>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ImportNode, distance: u32) {
        debug_assert!(
            self.queue.back().map_or(true, |last| last.distance <= distance),
            "frontier distances must be non-decreasing"
        );
        self.queue.push_back(QueuedNode { node, distance });
    }

    pub fn pop(&mut self) -> Option<QueuedNode> {
        self.queue.pop_front()
    }

    /// Number of queued nodes at `distance`
    pub fn count_at(&self, distance: u32) -> usize {
        self.queue.iter().filter(|q| q.distance == distance).count()
    }
}

/// Bounded set of concurrent tasks for one fan-out
///
/// At most `max_concurrent` tasks run at once. Results are yielded in
/// completion order. Dropping the pool aborts every unfinished task.
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Submits a task; it starts once a permit is free
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            task.await
        });
    }

    /// Waits for the next task to finish, in completion order
    ///
    /// Returns `None` once every submitted task has been yielded.
    pub async fn next_completed(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.join_next().await
    }
}
