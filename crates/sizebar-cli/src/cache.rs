//! `cache` command handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use sizebar_core::WidgetConfig;
use sizebar_fetch::{FileStorage, Storage, VariationCache};

/// Sub-commands available under `cache`.
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Show how many products are cached and the blob size
    Stats,
    /// Remove every cached product
    Clear,
}

fn open_cache(config: &WidgetConfig) -> (VariationCache, PathBuf) {
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.cache_dir.clone()));
    let ttl = Duration::from_secs(config.cache_ttl_hours.saturating_mul(3600));
    (VariationCache::new(storage, ttl), config.cache_dir.clone())
}

pub(crate) fn run(config: &WidgetConfig, command: &CacheCommands) -> anyhow::Result<()> {
    let (cache, dir) = open_cache(config);
    match command {
        CacheCommands::Stats => {
            let stats = cache.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheCommands::Clear => {
            cache.clear();
            println!("cleared variation cache in {}", dir.display());
        }
    }
    Ok(())
}
