//! Command-line tool for building and querying the vector store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use guida_retrieval::{
    CollectionKind, PageRecord, ProductRecord, UpdateOutcome, VectorStore, VectorStoreConfig,
};

#[derive(Debug, Parser)]
#[command(name = "guida-index", about = "Build and query the Guida vector store")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the snapshot directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Embed the configured source records and write snapshots.
    Build {
        /// Page records (JSON array).
        #[arg(long)]
        pages: Option<PathBuf>,

        /// Product records (JSON array).
        #[arg(long)]
        products: Option<PathBuf>,
    },

    /// Rank stored documents against a question.
    Search {
        query: String,

        #[arg(long)]
        max_results: Option<usize>,

        #[arg(long)]
        min_relevance: Option<f32>,
    },

    /// Print collection counts and fingerprints as JSON.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VectorStoreConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => VectorStoreConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Command::Build { pages, products } => {
            if let Some(path) = pages {
                config = config.with_source(CollectionKind::Pages, path);
            }
            if let Some(path) = products {
                config = config.with_source(CollectionKind::Products, path);
            }
            build(config).await
        }
        Command::Search {
            query,
            max_results,
            min_relevance,
        } => {
            let store = VectorStore::from_config(config)?;
            store.init().await;

            let max_results = max_results.unwrap_or(store.config().default_max_results);
            let min_relevance = min_relevance.unwrap_or(store.config().min_relevance);
            let results = store
                .search_with_threshold(&query, max_results, min_relevance)
                .await?;

            for kind in CollectionKind::ALL {
                println!("{kind}:");
                for hit in results.get(kind) {
                    println!(
                        "  {:.3}  {}  {}",
                        hit.score,
                        hit.document.metadata.title(),
                        hit.document.metadata.url()
                    );
                }
            }
            Ok(())
        }
        Command::Status => {
            let store = VectorStore::from_config(config)?;
            store.init().await;
            let status = store.collections_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

async fn build(config: VectorStoreConfig) -> Result<()> {
    let sources = config.sources.clone();
    let store = VectorStore::from_config(config)?;
    store.init().await;

    // Snapshots may predate the current source files.
    if let Some(path) = sources.path(CollectionKind::Pages) {
        let outcome = store.update_from_file::<PageRecord>(path).await?;
        report(CollectionKind::Pages, outcome);
    }
    if let Some(path) = sources.path(CollectionKind::Products) {
        let outcome = store.update_from_file::<ProductRecord>(path).await?;
        report(CollectionKind::Products, outcome);
    }

    store.wait_for_persistence().await;
    info!("Snapshots written to {}", store.config().data_dir.display());
    Ok(())
}

fn report(kind: CollectionKind, outcome: UpdateOutcome) {
    match outcome {
        UpdateOutcome::Unchanged => info!("{kind}: unchanged"),
        UpdateOutcome::Updated { documents } => info!("{kind}: embedded {documents} documents"),
    }
}
