mod config;
mod error;
mod models;
mod pipeline;
mod scrapers;
mod server;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{PipelineConfig, RendererKind, StoreKind};
use pipeline::{Orchestrator, Reconciler};
use scrapers::types::Location;
use scrapers::{ChromeRenderer, HttpRenderer, ListingExtractor, PageFetcher, Renderer};
use std::sync::Arc;
use store::{FileStore, ListingStore, MemoryStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fsbo-harvester")]
#[command(about = "Harvests for-sale-by-owner listings into a document store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP trigger (default)
    Serve,
    /// Run the pipeline once and print the summary
    Run {
        #[arg(long)]
        pages: Option<i64>,
        /// Search one city instead of the configured search path
        #[arg(long, conflicts_with = "all_locations")]
        city: Option<String>,
        /// Narrow `--city` to one district
        #[arg(long, requires = "city")]
        district: Option<String>,
        /// Walk every location in FSBO_LOCATIONS
        #[arg(long)]
        all_locations: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid configuration")?;

    info!("🏠 FSBO Harvester");
    info!("Target: {}", config.search.page_url(1));

    let orchestrator = build_orchestrator(config.clone()).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::serve(server::AppState::new(orchestrator), config.port).await?;
        }
        Commands::Run {
            pages,
            city,
            district,
            all_locations,
        } => {
            let report = if all_locations {
                let pages = pages.unwrap_or_else(|| config.default_pages.into());
                serde_json::to_string_pretty(&orchestrator.run_locations(pages).await?)?
            } else if let Some(city) = city {
                let location = Location::new(&city, district.as_deref())?;
                let pages = pages.unwrap_or_else(|| config.default_pages.into());
                serde_json::to_string_pretty(&orchestrator.run_location(&location, pages).await?)?
            } else {
                let summary = match pages {
                    Some(pages) => orchestrator.run(pages).await?,
                    None => orchestrator.run_default().await?,
                };
                serde_json::to_string_pretty(&summary)?
            };
            println!("{}", report);
        }
    }

    Ok(())
}

async fn build_orchestrator(config: PipelineConfig) -> Result<Orchestrator> {
    let renderer: Arc<dyn Renderer> = match config.renderer {
        RendererKind::Chrome => Arc::new(ChromeRenderer::new(config.fetch_timeout, config.render_settle)?),
        RendererKind::Http => Arc::new(HttpRenderer::new(config.fetch_timeout)?),
    };

    let store: Arc<dyn ListingStore> = match config.store {
        StoreKind::File => Arc::new(
            FileStore::open(&config.store_dir)
                .await
                .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?,
        ),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };
    info!("💾 Store: {} / renderer: {}", store.name(), renderer.name());

    let fetcher = PageFetcher::new(
        renderer,
        config.search.clone(),
        config.user_agent_pool(),
        config.delay,
    );
    let extractor = ListingExtractor::new(config.search.clone())?;
    let reconciler = Reconciler::new(store);

    Ok(Orchestrator::new(config, fetcher, extractor, reconciler))
}
