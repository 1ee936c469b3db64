use anyhow::{Context, Result};
use clap::Subcommand;

use super::load_config;
use crate::cli::output::get_formatter;
use crate::error::VectorStoreError;
use crate::models::{DistanceMetric, OutputFormat};
use crate::services::create_backend;

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
    #[command(about = "Show vector size, distance and point count")]
    Info {
        #[arg(help = "Collection name (defaults to the configured one)")]
        name: Option<String>,
    },
    #[command(about = "Create a collection")]
    Create {
        #[arg(help = "Collection name (defaults to the configured one)")]
        name: Option<String>,
        #[arg(long, short = 'd', help = "Vector dimension (defaults to embedding.dimension)")]
        dimension: Option<u64>,
        #[arg(long, help = "Distance metric: cosine or dot")]
        distance: Option<DistanceMetric>,
    },
    #[command(about = "Delete a collection and all its points")]
    Delete {
        #[arg(help = "Collection name (defaults to the configured one)")]
        name: Option<String>,
        #[arg(long, short = 'y', help = "Skip confirmation prompt")]
        force: bool,
    },
}

pub async fn handle_collection(cmd: CollectionCommand, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        CollectionCommand::Info { name } => {
            let config = load_config(name.as_deref())?;
            let collection = &config.vector_store.collection;
            let store = create_backend(&config.vector_store)?;
            let info = store
                .collection_info(collection)
                .await?
                .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.clone()))?;
            print!("{}", formatter.format_collection(&info));
        }
        CollectionCommand::Create {
            name,
            dimension,
            distance,
        } => {
            let config = load_config(name.as_deref())?;
            let collection = &config.vector_store.collection;
            let store = create_backend(&config.vector_store)?;
            let dimension = dimension.unwrap_or(u64::from(config.embedding.dimension));
            let distance = distance.unwrap_or(config.vector_store.distance);

            let info = store
                .ensure_collection(collection, dimension, distance)
                .await
                .with_context(|| format!("failed to create collection '{}'", collection))?;
            print!("{}", formatter.format_collection(&info));
        }
        CollectionCommand::Delete { name, force } => {
            let config = load_config(name.as_deref())?;
            let collection = &config.vector_store.collection;

            if !force {
                eprintln!(
                    "This will delete collection '{}' and all its points. Continue? [y/N]",
                    collection
                );
                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;
                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", formatter.format_message("Cancelled."));
                    return Ok(());
                }
            }

            let store = create_backend(&config.vector_store)?;
            let message = if store.delete_collection(collection).await? {
                format!("Deleted collection '{}'", collection)
            } else {
                format!("Collection '{}' does not exist", collection)
            };
            print!("{}", formatter.format_message(&message));
        }
    }

    Ok(())
}
