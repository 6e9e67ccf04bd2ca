//! Mutation-driven processing of cards appended after the initial scan.
//!
//! Added cards are queued (deduplicated) and drained once the document has
//! been quiet for the debounce period. Each new mutation restarts the quiet
//! period.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use futures::future::join_all;
use tokio::task::JoinHandle;

use super::{Engine, ProcessOutcome};
use crate::dom::{Document, Mutation, NodeId};
use crate::locator::CARDS;

#[derive(Debug, Default)]
pub(super) struct PendingQueue {
    order: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl PendingQueue {
    fn push(&mut self, node: NodeId) -> bool {
        if !self.members.insert(node) {
            return false;
        }
        self.order.push(node);
        true
    }

    fn take(&mut self) -> Vec<NodeId> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

impl Engine {
    /// Starts watching the document for added cards.
    ///
    /// The returned task holds only a weak reference and ends once the
    /// engine is dropped (at the next mutation) or the document goes away.
    pub fn observe(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.page.with(Document::subscribe);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(mutation) = rx.recv().await {
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                if let Mutation::Added { node, .. } = mutation {
                    engine.enqueue_added(node);
                }
            }
            tracing::debug!("mutation observer stopped");
        })
    }

    /// Queues the cards at or under `node` that still need processing.
    pub fn enqueue_added(self: &Arc<Self>, node: NodeId) {
        let cards = self.page.with(|doc| {
            if !doc.is_attached(node) {
                return Vec::new();
            }
            let own = doc.matches(node, &CARDS).then_some(node);
            own.into_iter()
                .chain(doc.query_all(node, &CARDS))
                .filter(|&card| doc.closest_ancestor(card, &CARDS).is_none())
                .collect::<Vec<_>>()
        });

        let added = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            cards
                .into_iter()
                .filter(|&card| !self.is_processed(card))
                .filter(|&card| queue.push(card))
                .count()
        };

        if added > 0 {
            tracing::debug!(added, "cards queued from mutation");
            self.schedule_drain();
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn schedule_drain(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay = self.tuning.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = weak.upgrade() {
                engine.drain_queue().await;
            }
        });

        let mut slot = self.debounce.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Drops queued cards and any scheduled drain.
    pub(super) fn cancel_pending(&self) {
        if let Some(task) = self
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Processes everything queued right now, staggering start times.
    async fn drain_queue(self: &Arc<Self>) {
        let cards = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if cards.is_empty() {
            return;
        }

        let stagger = self.tuning.stagger;
        let handles = cards.into_iter().zip(0u32..).map(|(card, index)| {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(stagger.saturating_mul(index)).await;
                engine.process_one(card).await
            })
        });

        let mut inserted = 0usize;
        for result in join_all(handles).await {
            match result {
                Ok(ProcessOutcome::Inserted(_)) => inserted += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "queued card task failed"),
            }
        }
        tracing::debug!(inserted, "queue drained");
    }
}
