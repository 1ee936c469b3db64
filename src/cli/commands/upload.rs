use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, progress_bar};
use crate::cli::output::get_formatter;
use crate::models::{DistanceMetric, IngestMode, OutputFormat};
use crate::services::interchange::read_embeddings;
use crate::services::{RunOptions, create_backend, upload_records};

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(help = "Embeddings JSONL file")]
    pub input: PathBuf,

    #[arg(long, short = 'c', help = "Target collection")]
    pub collection: Option<String>,

    #[arg(long, short = 'm', help = "Existing sources: upsert, skip, or replace")]
    pub mode: Option<IngestMode>,

    #[arg(long, help = "Distance for a new collection: cosine or dot")]
    pub distance: Option<DistanceMetric>,

    #[arg(long, help = "Drop and recreate the collection first")]
    pub recreate: bool,
}

pub async fn handle_upload(args: UploadArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(args.collection.as_deref())?;
    let collection = config.vector_store.collection.clone();

    let records = read_embeddings(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    if records.is_empty() {
        anyhow::bail!("no embeddings found in {}", args.input.display());
    }

    let store = create_backend(&config.vector_store)?;
    store
        .health_check()
        .await
        .context("vector store is not reachable")?;

    let options = RunOptions {
        mode: args.mode.unwrap_or(config.pipeline.mode),
        distance: args.distance.unwrap_or(config.vector_store.distance),
        recreate: args.recreate,
        progress: progress_bar(format == OutputFormat::Text, "points"),
    };

    let summary = upload_records(store.as_ref(), &collection, records, &options).await?;
    print!("{}", get_formatter(format).format_upload_summary(&summary));
    Ok(())
}
