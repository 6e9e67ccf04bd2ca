mod cache;
mod fetch;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cache::CacheCommands;

#[derive(Debug, Parser)]
#[command(name = "sizebar")]
#[command(about = "Size selector operator tools")]
struct Cli {
    /// Log per-product source resolution and processing detail
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch raw variation records for a product
    Fetch {
        product_id: String,
        /// Skip the local cache and go straight to the network sources
        #[arg(long)]
        fresh: bool,
    },
    /// Print the sorted size list for a product
    Sizes { product_id: String },
    /// Inspect or clear the local variation cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Run a page snapshot through the selector engine and print the result
    Render {
        /// JSON page snapshot: one element tree or an array of them
        page: PathBuf,
        /// JSON product table served as the host storefront API
        #[arg(long)]
        host_catalog: Option<PathBuf>,
        /// Write the rendered HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = sizebar_core::load_widget_config()?;
    config.verbose |= cli.verbose;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch { product_id, fresh } => {
            fetch::run_fetch(&config, &product_id, fresh).await?;
        }
        Commands::Sizes { product_id } => fetch::run_sizes(&config, &product_id).await?,
        Commands::Cache { command } => cache::run(&config, &command)?,
        Commands::Render {
            page,
            host_catalog,
            out,
        } => render::run(&config, &page, host_catalog.as_deref(), out.as_deref()).await?,
    }

    Ok(())
}
