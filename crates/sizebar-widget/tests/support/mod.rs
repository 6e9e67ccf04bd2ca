//! Shared fixtures for the widget integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;

use sizebar_core::{ProductId, VariationRecord};
use sizebar_widget::{Document, NodeId, NodeSpec, Page, VariationProvider};

/// In-memory variation source that counts calls and in-flight requests.
#[derive(Default)]
pub struct StubProvider {
    records: HashMap<String, Vec<VariationRecord>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn with(mut self, id: &str, records: Vec<VariationRecord>) -> Self {
        self.records.insert(id.to_owned(), records);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl VariationProvider for StubProvider {
    fn variations<'a>(&'a self, id: &'a ProductId) -> BoxFuture<'a, Vec<VariationRecord>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.records.get(id.as_str()).cloned().unwrap_or_default()
        })
    }
}

/// Records for sizes `values`, all in stock except those listed in `sold_out`.
pub fn sizes(values: &[&str], sold_out: &[&str]) -> Vec<VariationRecord> {
    let list: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let available = !sold_out.contains(v);
            json!({
                "id": 1000 + i,
                "options": [{"name": "Talle", "value": v}],
                "inStock": available,
                "unlimited": false
            })
        })
        .collect();
    serde_json::from_value(json!(list)).expect("valid records")
}

/// A theme-style product card with a name, price and link.
pub fn card(id: &str) -> NodeSpec {
    NodeSpec::element("div")
        .attr("class", "js-item-product item-product")
        .attr("data-product-id", id)
        .child(
            NodeSpec::element("div")
                .attr("class", "item-info")
                .child(
                    NodeSpec::element("a")
                        .attr("href", &format!("/productos/remera-{id}/"))
                        .text("Remera"),
                )
                .child(NodeSpec::element("span").attr("class", "item-price").text("$100")),
        )
}

/// Page with a single `.grid` holding `cards`. Returns the page and the grid.
pub fn page_with(cards: Vec<NodeSpec>) -> (Page, NodeId) {
    let grid = cards
        .into_iter()
        .fold(NodeSpec::element("div").attr("class", "grid"), NodeSpec::child);
    let doc = Document::from_specs(&[grid]);
    let grid = doc.children(doc.root())[0];
    (Page::new(doc), grid)
}

pub fn provider(stub: StubProvider) -> (Arc<StubProvider>, Arc<dyn VariationProvider>) {
    let stub = Arc::new(stub);
    let dyn_stub: Arc<dyn VariationProvider> = stub.clone();
    (stub, dyn_stub)
}
