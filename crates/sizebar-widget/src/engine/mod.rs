//! Idempotent augmentation of product cards.
//!
//! Each card node moves `Unseen → Processed` exactly once; the flag is set
//! before any awaiting so concurrent triggers for the same node collapse
//! into one pipeline run. The host page may re-render at any point, so the
//! document is re-checked after the fetch and again after the frame delay.
//! Results for nodes that were detached in the meantime are discarded.

mod observer;
mod provider;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use sizebar_core::{ProductId, Verbosity};
use sizebar_fetch::HostApiSlot;
use tokio::task::JoinHandle;

use crate::builder::{build_selector, resolve_product_url};
use crate::dom::{Document, NodeId, Page};
use crate::extract::extract_sizes;
use crate::locator::{
    find_cards, locate_id, locate_insertion_point, rendered_selectors, InsertionPoint,
};

pub use provider::VariationProvider;

use observer::PendingQueue;

/// Timing and batching knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTuning {
    /// Wait before a full scan reads the document.
    pub settle: Duration,
    /// Cards processed concurrently per scan batch.
    pub batch_size: usize,
    /// Pause between scan batches.
    pub batch_pause: Duration,
    /// Quiet period before queued cards from the observer are drained.
    pub debounce: Duration,
    /// Start offset between consecutive queued cards.
    pub stagger: Duration,
    /// Delay before inserting, standing in for the next render frame.
    pub frame: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            batch_size: 5,
            batch_pause: Duration::from_millis(100),
            debounce: Duration::from_millis(300),
            stagger: Duration::from_millis(100),
            frame: Duration::from_millis(16),
        }
    }
}

/// What [`Engine::process_one`] did with a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A selector was inserted; carries its root node.
    Inserted(NodeId),
    AlreadyProcessed,
    SelectorPresent,
    /// The card left the document before the selector could be inserted.
    Detached,
    NoProductId,
    NoVariations,
    NoSizes,
}

/// Summary of one [`Engine::process_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub discovered: usize,
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingCounts {
    pub processed: usize,
    pub total: usize,
}

pub struct Engine {
    page: Page,
    variations: Arc<dyn VariationProvider>,
    host: HostApiSlot,
    tuning: EngineTuning,
    verbosity: Verbosity,
    processed: Mutex<HashSet<NodeId>>,
    scanning: AtomicBool,
    queue: Mutex<PendingQueue>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the scanning flag when a scan ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Engine {
    #[must_use]
    pub fn new(
        page: Page,
        variations: Arc<dyn VariationProvider>,
        host: HostApiSlot,
        tuning: EngineTuning,
        verbosity: Verbosity,
    ) -> Arc<Self> {
        Arc::new(Self {
            page,
            variations,
            host,
            tuning,
            verbosity,
            processed: Mutex::new(HashSet::new()),
            scanning: AtomicBool::new(false),
            queue: Mutex::new(PendingQueue::default()),
            debounce: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    #[must_use]
    pub fn tuning(&self) -> &EngineTuning {
        &self.tuning
    }

    fn processed(&self) -> std::sync::MutexGuard<'_, HashSet<NodeId>> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_processed(&self, node: NodeId) -> bool {
        self.processed().contains(&node)
    }

    /// Forgets every processed flag. Existing selectors stay in place.
    pub fn reset(&self) {
        self.processed().clear();
    }

    /// Drops processed flags for cards that have left the document. Node ids
    /// are never reused, so a re-rendered card shows up under a new id and
    /// the old flag is dead weight. Returns how many flags were dropped.
    pub fn prune_detached(&self) -> usize {
        let tracked: Vec<NodeId> = self.processed().iter().copied().collect();
        let detached: Vec<NodeId> = self.page.with(|doc| {
            tracked
                .into_iter()
                .filter(|&node| !doc.is_attached(node))
                .collect()
        });
        if detached.is_empty() {
            return 0;
        }

        let mut processed = self.processed();
        for node in &detached {
            processed.remove(node);
        }
        tracing::debug!(pruned = detached.len(), "dropped flags for detached cards");
        detached.len()
    }

    /// Runs the augmentation pipeline for one card.
    pub async fn process_one(&self, card: NodeId) -> ProcessOutcome {
        if !self.processed().insert(card) {
            return ProcessOutcome::AlreadyProcessed;
        }

        let id = match self.page.with(|doc| Self::precheck(doc, card)) {
            Ok(id) => id,
            Err(outcome) => {
                self.trace(card, None, outcome);
                return outcome;
            }
        };

        let records = self.variations.variations(&id).await;
        if records.is_empty() {
            self.trace(card, Some(&id), ProcessOutcome::NoVariations);
            return ProcessOutcome::NoVariations;
        }
        let entries = extract_sizes(&records);
        if entries.is_empty() {
            self.trace(card, Some(&id), ProcessOutcome::NoSizes);
            return ProcessOutcome::NoSizes;
        }

        if let Some(outcome) = self.page.with(|doc| Self::stale(doc, card)) {
            self.trace(card, Some(&id), outcome);
            return outcome;
        }

        tokio::time::sleep(self.tuning.frame).await;

        let outcome = self.page.with(|doc| {
            if let Some(outcome) = Self::stale(doc, card) {
                return outcome;
            }
            let url = resolve_product_url(doc, card, &id, &self.host);
            let Some(spec) = build_selector(&entries, &id, &url) else {
                return ProcessOutcome::NoSizes;
            };
            let inserted = match locate_insertion_point(doc, card) {
                InsertionPoint::After(anchor) => doc
                    .insert_spec_after(anchor, &spec)
                    .unwrap_or_else(|| doc.append_spec(card, &spec)),
                InsertionPoint::Append(wrapper) => doc.append_spec(wrapper, &spec),
            };
            ProcessOutcome::Inserted(inserted)
        });
        self.trace(card, Some(&id), outcome);
        outcome
    }

    fn precheck(doc: &Document, card: NodeId) -> Result<ProductId, ProcessOutcome> {
        if let Some(outcome) = Self::stale(doc, card) {
            return Err(outcome);
        }
        locate_id(doc, card).ok_or(ProcessOutcome::NoProductId)
    }

    fn stale(doc: &Document, card: NodeId) -> Option<ProcessOutcome> {
        if !doc.is_attached(card) {
            Some(ProcessOutcome::Detached)
        } else if !rendered_selectors(doc, card).is_empty() {
            Some(ProcessOutcome::SelectorPresent)
        } else {
            None
        }
    }

    fn trace(&self, card: NodeId, id: Option<&ProductId>, outcome: ProcessOutcome) {
        let id = id.map(ProductId::as_str).unwrap_or_default();
        if self.verbosity.enabled() {
            tracing::info!(%card, product_id = id, ?outcome, "card processed");
        } else {
            tracing::debug!(%card, product_id = id, ?outcome, "card processed");
        }
    }

    /// Scans the whole document and processes every unprocessed card in
    /// throttled batches.
    ///
    /// Returns `None` without doing anything when a scan is already running.
    pub async fn process_all(self: &Arc<Self>) -> Option<ScanReport> {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            tracing::debug!("scan already in progress; skipping");
            return None;
        };

        self.cancel_pending();
        self.prune_detached();
        tokio::time::sleep(self.tuning.settle).await;

        let cards: Vec<NodeId> = self
            .page
            .with(|doc| find_cards(doc))
            .into_iter()
            .filter(|&card| !self.is_processed(card))
            .collect();

        let mut report = ScanReport {
            discovered: cards.len(),
            ..ScanReport::default()
        };
        if cards.is_empty() {
            return Some(report);
        }

        let mut batches = cards.chunks(self.tuning.batch_size.max(1)).peekable();
        while let Some(batch) = batches.next() {
            let handles = batch.iter().map(|&card| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.process_one(card).await })
            });
            for result in join_all(handles).await {
                match result {
                    Ok(ProcessOutcome::Inserted(_)) => report.inserted += 1,
                    Ok(_) => {}
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(error = %e, "card task failed");
                    }
                }
            }
            if batches.peek().is_some() {
                tokio::time::sleep(self.tuning.batch_pause).await;
            }
        }

        tracing::info!(
            discovered = report.discovered,
            inserted = report.inserted,
            failed = report.failed,
            "scan finished"
        );
        Some(report)
    }

    /// Removes all but the first selector inside each card. Returns how many
    /// were removed.
    pub fn dedupe_selectors(&self) -> usize {
        let removed = self.page.with(|doc| {
            let mut removed = 0;
            for card in find_cards(doc) {
                for extra in rendered_selectors(doc, card).into_iter().skip(1) {
                    doc.remove(extra);
                    removed += 1;
                }
            }
            removed
        });
        if removed > 0 {
            tracing::info!(removed, "duplicate selectors removed");
        }
        removed
    }

    /// Processed vs. total cards currently in the document.
    #[must_use]
    pub fn counts(&self) -> ProcessingCounts {
        let cards = self.page.with(|doc| find_cards(doc));
        let processed = self.processed();
        ProcessingCounts {
            processed: cards.iter().filter(|c| processed.contains(*c)).count(),
            total: cards.len(),
        }
    }
}
