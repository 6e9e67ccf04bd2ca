//! `fetch` and `sizes` command handlers.

use anyhow::Context;
use sizebar_core::{ProductId, Verbosity, WidgetConfig};
use sizebar_fetch::{HostApiSlot, VariationFetcher};
use sizebar_widget::extract_sizes;

pub(crate) fn parse_product_id(raw: &str) -> anyhow::Result<ProductId> {
    ProductId::parse(raw).with_context(|| format!("invalid product id: {raw:?}"))
}

fn build_fetcher(config: &WidgetConfig) -> anyhow::Result<VariationFetcher> {
    VariationFetcher::from_config(config, HostApiSlot::new(), Verbosity::new(config.verbose))
        .context("failed to build variation fetcher")
}

/// Prints the records for one product as JSON, tagged with their source.
pub(crate) async fn run_fetch(
    config: &WidgetConfig,
    product_id: &str,
    fresh: bool,
) -> anyhow::Result<()> {
    let id = parse_product_id(product_id)?;
    let fetcher = build_fetcher(config)?;

    if fresh {
        // Dropping the whole blob is the only invalidation the cache offers.
        fetcher.cache().clear();
    }

    let Some((records, source)) = fetcher.fetch_with_source(&id).await else {
        println!("no variation data for product {id}");
        return Ok(());
    };

    let out = serde_json::json!({
        "product_id": id.as_str(),
        "source": source.to_string(),
        "records": records,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Prints one line per size: value, availability and variation id.
pub(crate) async fn run_sizes(config: &WidgetConfig, product_id: &str) -> anyhow::Result<()> {
    let id = parse_product_id(product_id)?;
    let fetcher = build_fetcher(config)?;
    let entries = extract_sizes(&fetcher.fetch(&id).await);

    if entries.is_empty() {
        println!("no sizes for product {id}");
        return Ok(());
    }

    for entry in entries {
        let availability = if entry.in_stock { "in stock" } else { "sold out" };
        let variation = entry
            .variation_id
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string);
        println!("{:<8} {:<10} {}", entry.value, availability, variation);
    }
    Ok(())
}
