use anyhow::Result;
use clap::Args;

use super::load_config;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{EmbeddingBackend, OutputFormat, VectorDriver};
use crate::services::{Checkpoint, create_backend, create_embedder};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, short = 'c', help = "Collection to report on")]
    pub collection: Option<String>,
}

pub async fn handle_status(args: StatusArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(args.collection.as_deref())?;
    let formatter = get_formatter(format);
    let collection = config.vector_store.collection.clone();

    let embedding_error = match create_embedder(&config.embedding) {
        Ok(embedder) => embedder.health_check().await.err().map(|e| e.to_string()),
        Err(e) => Some(e.to_string()),
    };

    let (vector_store_connected, collection_info) = match create_backend(&config.vector_store) {
        Ok(store) => {
            let connected = store.health_check().await.is_ok();
            let info = if connected {
                store.collection_info(&collection).await.ok().flatten()
            } else {
                None
            };
            (connected, info)
        }
        Err(_) => (false, None),
    };

    let checkpoint = config
        .pipeline
        .checkpoint_path_or_default()
        .filter(|path| path.exists())
        .and_then(|path| Checkpoint::open(&path).ok())
        .and_then(|ledger| ledger.stats(&collection).ok());

    let status = StatusInfo {
        embedding_backend: config.embedding.backend.to_string(),
        embedding_model: config.embedding.model.clone(),
        embedding_endpoint: match config.embedding.backend {
            EmbeddingBackend::Http => config.embedding.url.clone(),
            EmbeddingBackend::Onnx => config
                .embedding
                .model_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(model_path not set)".to_string()),
        },
        embedding_dimension: config.embedding.dimension,
        embedding_ready: embedding_error.is_none(),
        embedding_error,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection,
        collection_info,
        checkpoint,
    };

    print!("{}", formatter.format_status(&status));

    if !status.embedding_ready || !vector_store_connected {
        eprintln!();
        if !status.embedding_ready && config.embedding.backend == EmbeddingBackend::Http {
            eprintln!("Hint: embedding server not reachable at {}", config.embedding.url);
        }
        if !vector_store_connected && config.vector_store.driver == VectorDriver::Qdrant {
            eprintln!("Warning: Qdrant not running. Start with: docker-compose up -d qdrant");
        }
    }

    Ok(())
}
