//! `render` command: run a saved page through the full widget pipeline.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use sizebar_core::{Verbosity, WidgetConfig};
use sizebar_fetch::{HostApiSlot, StaticStorefront, VariationFetcher};
use sizebar_widget::{
    Document, EngineTuning, HostEvent, NodeSpec, Page, RecordingNavigator, Widget, WidgetParts,
    DEFAULT_HOST_WAIT,
};
use tokio::sync::mpsc;

/// Parses a page snapshot: a single element tree or an array of them.
pub(crate) fn parse_snapshot(raw: &str) -> anyhow::Result<Vec<NodeSpec>> {
    let value: Value = serde_json::from_str(raw).context("page snapshot is not valid JSON")?;
    if value.is_array() {
        serde_json::from_value(value).context("page snapshot array has an invalid element")
    } else {
        let single: NodeSpec =
            serde_json::from_value(value).context("page snapshot is not an element tree")?;
        Ok(vec![single])
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub(crate) async fn run(
    config: &WidgetConfig,
    page_path: &Path,
    host_catalog: Option<&Path>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let specs = parse_snapshot(&read(page_path)?)?;
    let page = Page::new(Document::from_specs(&specs));

    let catalog = host_catalog
        .map(|path| -> anyhow::Result<StaticStorefront> {
            serde_json::from_str(&read(path)?)
                .with_context(|| format!("invalid host catalog in {}", path.display()))
        })
        .transpose()?;

    let verbosity = Verbosity::new(config.verbose);
    let host = HostApiSlot::new();
    let fetcher = VariationFetcher::from_config(config, host.clone(), verbosity.clone())
        .context("failed to build variation fetcher")?;
    let widget = Widget::new(WidgetParts {
        page: page.clone(),
        cache: Arc::clone(fetcher.cache()),
        host,
        variations: Arc::new(fetcher),
        navigator: Arc::new(RecordingNavigator::new()),
        tuning: EngineTuning::default(),
        host_wait: DEFAULT_HOST_WAIT,
        verbosity,
    });

    // The event stream closes after the optional catalog, so the widget
    // readies, scans once and returns.
    let (tx, rx) = mpsc::channel(1);
    let task = widget
        .start(rx)
        .context("widget was already started")?;
    if let Some(catalog) = catalog {
        tx.send(HostEvent::ApiLoaded(Arc::new(catalog)))
            .await
            .map_err(|_| anyhow::anyhow!("widget stopped before the host catalog was delivered"))?;
    }
    drop(tx);
    task.await.context("widget task failed")?;
    widget.shutdown();

    let counts = widget.counts();
    tracing::info!(
        processed = counts.processed,
        total = counts.total,
        "page rendered"
    );

    let html = page.with(|doc| {
        doc.children(doc.root())
            .iter()
            .map(|&child| doc.to_html(child))
            .collect::<Vec<_>>()
            .join("\n")
    });
    match out {
        Some(path) => std::fs::write(path, html)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{html}"),
    }
    Ok(())
}
